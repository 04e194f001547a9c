//! Classification quality metrics.
//!
//! [`ClassificationEstimator`] accumulates outcomes into a confusion matrix
//! and derives accuracy, per-class precision/recall/F1 and macro averages
//! from it; estimators from separate evaluation folds can be averaged
//! cell-wise and their score spread summarized.

mod estimator;

pub use estimator::{ClassificationEstimates, ClassificationEstimator};

/// Compute classification accuracy over aligned label slices.
///
/// accuracy = `correct_predictions` / `total_predictions`
///
/// # Panics
///
/// Panics if the slices have different lengths or are empty.
///
/// # Examples
///
/// ```
/// use vecindad::metrics::accuracy;
///
/// let y_true = vec![0, 1, 2, 0];
/// let y_pred = vec![0, 1, 1, 0];
/// assert!((accuracy(&y_pred, &y_true) - 0.75).abs() < 1e-6);
/// ```
#[must_use]
pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let correct = y_pred
        .iter()
        .zip(y_true.iter())
        .filter(|(p, t)| p == t)
        .count();

    correct as f32 / y_true.len() as f32
}

#[cfg(test)]
#[path = "tests_estimator_contract.rs"]
mod tests_estimator_contract;
