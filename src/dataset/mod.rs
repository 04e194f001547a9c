//! Labeled point sets.
//!
//! A [`DataSet`] pairs a row-major feature matrix with one integer class
//! label per point. Identity is positional: indices are stable within one
//! set but not across sub-sampling, so every derived view is produced from
//! an explicit index list that the caller retains as the local-to-original
//! remapping.

use crate::error::{Result, VecindadError};
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// An ordered set of feature vectors with integer class labels.
///
/// A negative label marks a point as unlabeled. Labeled classes are the
/// contiguous range `0..num_classes()`.
///
/// # Examples
///
/// ```
/// use vecindad::dataset::DataSet;
/// use vecindad::primitives::Matrix;
///
/// let features = Matrix::from_vec(4, 2, vec![
///     0.0, 0.0,
///     0.0, 1.0,
///     5.0, 5.0,
///     5.0, 6.0,
/// ]).expect("4x2 matrix");
/// let data = DataSet::new(features, vec![0, 0, 1, 1]).expect("matching label count");
///
/// assert_eq!(data.n_points(), 4);
/// assert_eq!(data.num_classes(), 2);
/// assert_eq!(data.point(2), &[5.0, 5.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    features: Matrix<f32>,
    labels: Vec<i32>,
}

impl DataSet {
    /// Creates a data set from a feature matrix and per-point labels.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the label count does not match the number
    /// of feature rows.
    pub fn new(features: Matrix<f32>, labels: Vec<i32>) -> Result<Self> {
        if labels.len() != features.n_rows() {
            return Err(VecindadError::length_mismatch(
                "labels",
                features.n_rows(),
                labels.len(),
            ));
        }
        Ok(Self { features, labels })
    }

    /// Number of points.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.features.n_rows()
    }

    /// Number of features per point.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.n_cols()
    }

    /// The feature vector of point `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn point(&self, idx: usize) -> &[f32] {
        self.features.row_slice(idx)
    }

    /// The label of point `idx`; negative means unlabeled.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn label(&self, idx: usize) -> i32 {
        self.labels[idx]
    }

    /// All labels, by point index.
    #[must_use]
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// The underlying feature matrix.
    #[must_use]
    pub fn features(&self) -> &Matrix<f32> {
        &self.features
    }

    /// Number of classes: one past the highest non-negative label, 0 when
    /// every point is unlabeled.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&l| l >= 0)
            .max()
            .map_or(0, |&m| m as usize + 1)
    }

    /// Per-class point counts, indexed by class label.
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for &label in &self.labels {
            if label >= 0 {
                counts[label as usize] += 1;
            }
        }
        counts
    }

    /// True when no point is unlabeled.
    #[must_use]
    pub fn is_fully_labeled(&self) -> bool {
        self.labels.iter().all(|&l| l >= 0)
    }

    /// Builds the sub-set containing the given points, in the order given.
    ///
    /// The caller keeps `indices` as the remapping: local index `i` in the
    /// returned set corresponds to original index `indices[i]`.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> DataSet {
        DataSet {
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Returns a copy of this set with the labels replaced.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the label count does not match.
    pub fn relabeled(&self, labels: Vec<i32>) -> Result<DataSet> {
        DataSet::new(self.features.clone(), labels)
    }

    /// Returns a copy where each labeled point's class is, with probability
    /// `rate`, replaced by a uniformly random *different* class.
    ///
    /// Deterministic under a fixed seed; used to produce mislabeling
    /// perturbation variants of a data set.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `rate` is outside `[0, 1]` or the set has
    /// fewer than two classes.
    pub fn with_mislabeling(&self, rate: f32, seed: u64) -> Result<DataSet> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(VecindadError::configuration(format!(
                "mislabeling rate must be in [0, 1], got {rate}"
            )));
        }
        let num_classes = self.num_classes();
        if num_classes < 2 {
            return Err(VecindadError::configuration(
                "mislabeling requires at least two classes",
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut labels = self.labels.clone();
        for label in &mut labels {
            if *label < 0 || rng.gen::<f32>() >= rate {
                continue;
            }
            // Draw among the other classes, skipping the current one.
            let offset = rng.gen_range(1..num_classes as i32);
            *label = (*label + offset) % num_classes as i32;
        }
        DataSet::new(self.features.clone(), labels)
    }
}
