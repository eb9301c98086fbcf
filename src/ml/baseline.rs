//! Baseline estimators
//!
//! Reference predictors for sanity checks and as cheap selection
//! candidates: a fixed-label classifier and a majority-class classifier.

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::{GraphError, Result};
use crate::ml::Estimator;

/// Always predicts one fixed label, ignoring the features.
pub struct ConstantClassifier {
    label: f64,
}

impl ConstantClassifier {
    pub fn new(label: f64) -> Self {
        Self { label }
    }
}

impl Estimator for ConstantClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(GraphError::LengthMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(x.nrows(), self.label))
    }
}

/// Predicts the most frequent training label; ties break toward the
/// smallest label.
#[derive(Default)]
pub struct MajorityClassifier {
    majority: Option<f64>,
}

impl MajorityClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for MajorityClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(GraphError::LengthMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if y.is_empty() {
            return Err(GraphError::EmptyWindow("training set"));
        }

        let mut counts: std::collections::BTreeMap<i64, usize> = std::collections::BTreeMap::new();
        for &label in y.iter() {
            *counts.entry(label as i64).or_insert(0) += 1;
        }
        let mut winner = 0.0;
        let mut best = 0;
        for (label, count) in counts {
            if count > best {
                best = count;
                winner = label as f64;
            }
        }
        self.majority = Some(winner);

        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let majority = self.majority.ok_or(GraphError::NotFitted)?;
        Ok(Array1::from_elem(x.nrows(), majority))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_constant_ignores_features() {
        let model = ConstantClassifier::new(1.0);
        let predictions = model.predict(array![[1.0], [2.0], [3.0]].view()).unwrap();
        assert_eq!(predictions, array![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_majority_learns_most_frequent_label() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, -1.0, 1.0, 1.0];

        let mut model = MajorityClassifier::new();
        model.fit(x.view(), y.view()).unwrap();

        let predictions = model.predict(array![[9.0]].view()).unwrap();
        assert_eq!(predictions, array![1.0]);
    }

    #[test]
    fn test_majority_requires_fit() {
        let model = MajorityClassifier::new();
        assert!(matches!(
            model.predict(array![[1.0]].view()),
            Err(GraphError::NotFitted)
        ));
    }
}
