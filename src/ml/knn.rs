//! k-nearest-neighbor estimators
//!
//! Instance-based estimators used as concrete graph leaves. With `k = 1`
//! they memorize the training set exactly, which makes them a convenient
//! perfect-recall meta model for selection graphs.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::collections::BTreeMap;

use crate::error::{GraphError, Result};
use crate::ml::Estimator;

/// Distance metric between feature rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
}

impl DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => {
                a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
            }
        }
    }
}

struct Fitted {
    x: Array2<f64>,
    y: Array1<f64>,
}

fn check_training_set(x: ArrayView2<f64>, y: ArrayView1<f64>, k: usize) -> Result<()> {
    if k == 0 {
        return Err(GraphError::InvalidArgument(
            "k must be positive".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(GraphError::LengthMismatch {
            expected: x.nrows(),
            got: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(GraphError::EmptyWindow("training set"));
    }
    Ok(())
}

/// Indices of the `k` nearest training rows to `sample`.
fn nearest(fitted: &Fitted, sample: ArrayView1<f64>, k: usize, metric: DistanceMetric) -> Vec<usize> {
    let mut distances: Vec<(usize, f64)> = fitted
        .x
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| (i, metric.distance(sample, row)))
        .collect();
    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    distances.into_iter().take(k).map(|(i, _)| i).collect()
}

/// Majority-vote classifier over the k nearest neighbors
pub struct KnnClassifier {
    k: usize,
    metric: DistanceMetric,
    fitted: Option<Fitted>,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            metric: DistanceMetric::Euclidean,
            fitted: None,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

impl Estimator for KnnClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_set(x, y, self.k)?;
        self.fitted = Some(Fitted {
            x: x.to_owned(),
            y: y.to_owned(),
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(GraphError::NotFitted)?;

        let mut predictions = Vec::with_capacity(x.nrows());
        for sample in x.rows() {
            let neighbors = nearest(fitted, sample, self.k, self.metric);

            // Label votes keyed on the integer label; ties break toward the
            // smallest label so repeated runs agree.
            let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
            for i in neighbors {
                *votes.entry(fitted.y[i] as i64).or_insert(0) += 1;
            }
            let mut winner = 0.0;
            let mut best = 0;
            for (label, count) in votes {
                if count > best {
                    best = count;
                    winner = label as f64;
                }
            }
            predictions.push(winner);
        }

        Ok(Array1::from_vec(predictions))
    }
}

/// Neighbor-mean regressor over the k nearest neighbors
pub struct KnnRegressor {
    k: usize,
    metric: DistanceMetric,
    fitted: Option<Fitted>,
}

impl KnnRegressor {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            metric: DistanceMetric::Euclidean,
            fitted: None,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

impl Estimator for KnnRegressor {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_set(x, y, self.k)?;
        self.fitted = Some(Fitted {
            x: x.to_owned(),
            y: y.to_owned(),
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(GraphError::NotFitted)?;

        let mut predictions = Vec::with_capacity(x.nrows());
        for sample in x.rows() {
            let neighbors = nearest(fitted, sample, self.k, self.metric);
            let sum: f64 = neighbors.iter().map(|&i| fitted.y[i]).sum();
            predictions.push(sum / neighbors.len() as f64);
        }

        Ok(Array1::from_vec(predictions))
    }
}
