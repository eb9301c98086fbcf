//! Evaluation metrics
//!
//! Classification: accuracy, precision, recall, F1.
//! Regression: MAE, MSE, R².
//!
//! Inputs must be row-aligned; a length mismatch is an error rather than a
//! silent truncation.

use ndarray::ArrayView1;

use crate::error::{GraphError, Result};

/// Tolerance for comparing discrete labels stored as `f64`.
const LABEL_EPS: f64 = 1e-10;

pub(crate) fn labels_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < LABEL_EPS
}

fn check_lengths(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(GraphError::LengthMismatch {
            expected: y_true.len(),
            got: y_pred.len(),
        });
    }
    Ok(())
}

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| labels_equal(**t, **p))
        .count();

    Ok(correct as f64 / y_true.len() as f64)
}

fn confusion_counts(
    y_true: ArrayView1<f64>,
    y_pred: ArrayView1<f64>,
    positive_class: f64,
) -> (usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        let true_positive = labels_equal(*t, positive_class);
        let predicted_positive = labels_equal(*p, positive_class);
        match (true_positive, predicted_positive) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    (tp, fp, fn_)
}

/// TP / (TP + FP) for the given positive class.
pub fn precision(
    y_true: ArrayView1<f64>,
    y_pred: ArrayView1<f64>,
    positive_class: f64,
) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let (tp, fp, _) = confusion_counts(y_true, y_pred, positive_class);
    Ok(if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    })
}

/// TP / (TP + FN) for the given positive class.
pub fn recall(
    y_true: ArrayView1<f64>,
    y_pred: ArrayView1<f64>,
    positive_class: f64,
) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let (tp, _, fn_) = confusion_counts(y_true, y_pred, positive_class);
    Ok(if tp + fn_ == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_) as f64
    })
}

/// Harmonic mean of precision and recall.
pub fn f1_score(
    y_true: ArrayView1<f64>,
    y_pred: ArrayView1<f64>,
    positive_class: f64,
) -> Result<f64> {
    let precision = precision(y_true, y_pred, positive_class)?;
    let recall = recall(y_true, y_pred, positive_class)?;

    Ok(if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    })
}

/// Mean absolute error.
pub fn mae(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }

    Ok(y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64)
}

/// Mean squared error.
pub fn mse(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }

    Ok(y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64)
}

/// R² coefficient of determination; 0.0 when the truth has no variance.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }

    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    Ok(if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y_true = array![1.0, 1.0, -1.0, 1.0];
        let y_pred = array![1.0, 1.0, 1.0, 1.0];

        let value = accuracy(y_true.view(), y_pred.view()).unwrap();
        assert!((value - 0.75).abs() < 1e-10);
    }

    #[test]
    fn test_precision_recall_f1() {
        let y_true = array![1.0, 1.0, 1.0, -1.0, -1.0];
        let y_pred = array![1.0, 1.0, -1.0, 1.0, -1.0];

        // TP=2, FP=1, FN=1
        let p = precision(y_true.view(), y_pred.view(), 1.0).unwrap();
        let r = recall(y_true.view(), y_pred.view(), 1.0).unwrap();
        let f1 = f1_score(y_true.view(), y_pred.view(), 1.0).unwrap();

        assert!((p - 2.0 / 3.0).abs() < 1e-10);
        assert!((r - 2.0 / 3.0).abs() < 1e-10);
        assert!((f1 - 2.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![2.0, 3.0, 4.0, 5.0];

        assert!((mae(y_true.view(), y_pred.view()).unwrap() - 1.0).abs() < 1e-10);
        assert!((mse(y_true.view(), y_pred.view()).unwrap() - 1.0).abs() < 1e-10);

        let perfect = r2_score(y_true.view(), y_true.view()).unwrap();
        assert!((perfect - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let y_true = array![1.0, 2.0];
        let y_pred = array![1.0];
        assert!(accuracy(y_true.view(), y_pred.view()).is_err());
    }
}
