//! Estimators and evaluation metrics
//!
//! The numeric layer below the graph: estimators consume an aligned, dense
//! feature matrix and a matching label vector; they know nothing about time
//! indices or providers.

pub mod baseline;
pub mod knn;
pub mod metrics;

pub use baseline::{ConstantClassifier, MajorityClassifier};
pub use knn::{DistanceMetric, KnnClassifier, KnnRegressor};

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::Result;

/// Numeric estimator contract
///
/// `fit` trains internal state from row-aligned features and labels;
/// `predict` returns exactly one prediction per input row, in row order.
pub trait Estimator {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()>;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;
}
