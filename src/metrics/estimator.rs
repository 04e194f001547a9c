//! Confusion-matrix accumulation and derived classification estimates.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecindadError};
use crate::primitives::Matrix;

/// Scalar estimates derived from one confusion matrix.
///
/// Per-class vectors are indexed by class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEstimates {
    /// Fraction of correctly classified points.
    pub accuracy: f32,
    /// Unweighted mean precision over classes with predictions.
    pub macro_precision: f32,
    /// Unweighted mean recall over classes with true instances.
    pub macro_recall: f32,
    /// Unweighted mean F1 over classes appearing at all.
    pub macro_f1: f32,
    /// Per-class precision.
    pub precision: Vec<f32>,
    /// Per-class recall.
    pub recall: Vec<f32>,
    /// Per-class F1.
    pub f1: Vec<f32>,
}

/// Accumulates classification outcomes into a confusion matrix and derives
/// quality estimates from it.
///
/// Cell `[actual][predicted]` counts how often a point of true class
/// `actual` was classified as `predicted` (row = true class, column =
/// predicted class). Counts are `f32` so probabilistic classifiers can
/// accumulate fractional (fuzzy) votes.
///
/// # Examples
///
/// ```
/// use vecindad::metrics::ClassificationEstimator;
///
/// let mut est = ClassificationEstimator::new(2);
/// est.record(0, 0);
/// est.record(0, 1);
/// est.record(1, 1);
/// est.record(1, 1);
///
/// assert!((est.accuracy() - 0.75).abs() < 1e-6);
/// assert_eq!(est.total(), 4.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEstimator {
    matrix: Matrix<f32>,
}

impl ClassificationEstimator {
    /// Creates an empty estimator for `num_classes` classes.
    #[must_use]
    pub fn new(num_classes: usize) -> Self {
        Self {
            matrix: Matrix::zeros(num_classes, num_classes),
        }
    }

    /// Wraps an existing confusion matrix.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the matrix is not square or contains a
    /// negative or non-finite cell.
    pub fn from_matrix(matrix: Matrix<f32>) -> Result<Self> {
        if matrix.n_rows() != matrix.n_cols() {
            return Err(VecindadError::configuration(format!(
                "confusion matrix must be square, got {}x{}",
                matrix.n_rows(),
                matrix.n_cols()
            )));
        }
        if let Some(cell) = matrix
            .as_slice()
            .iter()
            .find(|c| !c.is_finite() || **c < 0.0)
        {
            return Err(VecindadError::configuration(format!(
                "confusion matrix cell must be a non-negative finite count, got {cell}"
            )));
        }
        Ok(Self { matrix })
    }

    /// Builds an estimator by recording aligned actual/predicted labels.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` on mismatched lengths or a label outside
    /// `0..num_classes`.
    pub fn from_labels(actual: &[usize], predicted: &[usize], num_classes: usize) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(VecindadError::length_mismatch(
                "predicted labels",
                actual.len(),
                predicted.len(),
            ));
        }
        let mut est = Self::new(num_classes);
        for (&a, &p) in actual.iter().zip(predicted) {
            if a >= num_classes || p >= num_classes {
                return Err(VecindadError::configuration(format!(
                    "label pair ({a}, {p}) outside 0..{num_classes}"
                )));
            }
            est.record(a, p);
        }
        Ok(est)
    }

    /// Records one classification outcome.
    ///
    /// # Panics
    ///
    /// Panics if either class is out of range.
    pub fn record(&mut self, actual: usize, predicted: usize) {
        self.record_weighted(actual, predicted, 1.0);
    }

    /// Records a fractionally weighted outcome, e.g. a fuzzy vote share.
    ///
    /// # Panics
    ///
    /// Panics if either class is out of range.
    pub fn record_weighted(&mut self, actual: usize, predicted: usize, weight: f32) {
        let current = self.matrix.get(actual, predicted);
        self.matrix.set(actual, predicted, current + weight);
    }

    /// The number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.matrix.n_rows()
    }

    /// The underlying confusion matrix.
    #[must_use]
    pub fn matrix(&self) -> &Matrix<f32> {
        &self.matrix
    }

    /// Total recorded weight.
    #[must_use]
    pub fn total(&self) -> f32 {
        self.matrix.sum()
    }

    /// Fraction of the total weight on the diagonal; 0.0 when nothing has
    /// been recorded.
    #[must_use]
    pub fn accuracy(&self) -> f32 {
        let total = self.total();
        if total == 0.0 {
            return 0.0;
        }
        self.matrix.trace() / total
    }

    /// Precision of `class`: diagonal over column sum, 0.0 when the class
    /// was never predicted.
    ///
    /// # Panics
    ///
    /// Panics if `class` is out of range.
    #[must_use]
    pub fn precision(&self, class: usize) -> f32 {
        let predicted = self.matrix.col_sum(class);
        if predicted == 0.0 {
            return 0.0;
        }
        self.matrix.get(class, class) / predicted
    }

    /// Recall of `class`: diagonal over row sum, 0.0 when the class has no
    /// true instances.
    ///
    /// # Panics
    ///
    /// Panics if `class` is out of range.
    #[must_use]
    pub fn recall(&self, class: usize) -> f32 {
        let actual = self.matrix.row_sum(class);
        if actual == 0.0 {
            return 0.0;
        }
        self.matrix.get(class, class) / actual
    }

    /// F1 of `class`: harmonic mean of precision and recall, 0.0 when both
    /// vanish.
    ///
    /// # Panics
    ///
    /// Panics if `class` is out of range.
    #[must_use]
    pub fn f1(&self, class: usize) -> f32 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }

    /// Mean precision over classes that were predicted at least once.
    #[must_use]
    pub fn macro_precision(&self) -> f32 {
        self.macro_over(|c| self.matrix.col_sum(c) > 0.0, |c| self.precision(c))
    }

    /// Mean recall over classes with at least one true instance.
    #[must_use]
    pub fn macro_recall(&self) -> f32 {
        self.macro_over(|c| self.matrix.row_sum(c) > 0.0, |c| self.recall(c))
    }

    /// Mean F1 over classes appearing as either a true or predicted class.
    #[must_use]
    pub fn macro_f1(&self) -> f32 {
        self.macro_over(
            |c| self.matrix.row_sum(c) + self.matrix.col_sum(c) > 0.0,
            |c| self.f1(c),
        )
    }

    /// Mean of `metric` over the classes passing `participates`; 0.0 when
    /// none do.
    fn macro_over<P, F>(&self, participates: P, metric: F) -> f32
    where
        P: Fn(usize) -> bool,
        F: Fn(usize) -> f32,
    {
        let classes: Vec<usize> = (0..self.num_classes()).filter(|&c| participates(c)).collect();
        if classes.is_empty() {
            return 0.0;
        }
        classes.iter().map(|&c| metric(c)).sum::<f32>() / classes.len() as f32
    }

    /// Derives all scalar estimates at once.
    #[must_use]
    pub fn estimates(&self) -> ClassificationEstimates {
        let n = self.num_classes();
        ClassificationEstimates {
            accuracy: self.accuracy(),
            macro_precision: self.macro_precision(),
            macro_recall: self.macro_recall(),
            macro_f1: self.macro_f1(),
            precision: (0..n).map(|c| self.precision(c)).collect(),
            recall: (0..n).map(|c| self.recall(c)).collect(),
            f1: (0..n).map(|c| self.f1(c)).collect(),
        }
    }

    /// Cell-wise mean of several estimators, the aggregate of per-fold
    /// results.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` on an empty slice or mismatched class counts.
    pub fn average(estimators: &[Self]) -> Result<Self> {
        let Some(first) = estimators.first() else {
            return Err(VecindadError::configuration(
                "cannot average zero estimators",
            ));
        };
        let n = first.num_classes();
        let mut matrix = Matrix::zeros(n, n);
        for est in estimators {
            if est.num_classes() != n {
                return Err(VecindadError::length_mismatch(
                    "estimator classes",
                    n,
                    est.num_classes(),
                ));
            }
            for row in 0..n {
                for col in 0..n {
                    let cell = matrix.get(row, col) + est.matrix.get(row, col);
                    matrix.set(row, col, cell);
                }
            }
        }
        let count = estimators.len() as f32;
        for row in 0..n {
            for col in 0..n {
                matrix.set(row, col, matrix.get(row, col) / count);
            }
        }
        Ok(Self { matrix })
    }

    /// Mean and standard deviation of a scalar metric across estimators,
    /// e.g. the accuracy spread over folds. Returns `(0.0, 0.0)` for an
    /// empty slice.
    pub fn metric_spread<F>(estimators: &[Self], metric: F) -> (f32, f32)
    where
        F: Fn(&Self) -> f32,
    {
        if estimators.is_empty() {
            return (0.0, 0.0);
        }
        let values: Vec<f32> = estimators.iter().map(metric).collect();
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let variance = values
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f32>()
            / n;
        (mean, variance.sqrt())
    }
}
