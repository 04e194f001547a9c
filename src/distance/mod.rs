//! Distance metrics and pairwise distance matrices.
//!
//! The [`Metric`] trait abstracts over point-to-point distance functions;
//! [`DistanceMetric`] covers the built-in Minkowski family. A
//! [`DistanceMatrix`] holds all pairwise distances of a data set in
//! upper-triangular form so that each unordered pair is computed and stored
//! exactly once.

mod matrix;

pub use matrix::DistanceMatrix;

use crate::dataset::DataSet;
use crate::error::{Result, VecindadError};

/// A symmetric point-to-point distance function.
///
/// Implementations must be `Send + Sync` so matrix computation can fan rows
/// out across threads.
pub trait Metric: Send + Sync {
    /// Computes the distance between two feature vectors.
    ///
    /// # Errors
    ///
    /// Returns an error when the distance cannot be evaluated, e.g. on
    /// mismatched vector lengths.
    fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32>;
}

/// Built-in distance metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceMetric {
    /// Euclidean distance: `sqrt(sum((x_i` - `y_i)^2`))
    Euclidean,
    /// Manhattan distance: `sum(|x_i` - `y_i`|)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f32),
}

impl Metric for DistanceMetric {
    fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(VecindadError::length_mismatch(
                "distance operands",
                a.len(),
                b.len(),
            ));
        }
        match *self {
            DistanceMetric::Euclidean => {
                let mut sum = 0.0;
                for (x, y) in a.iter().zip(b) {
                    let diff = x - y;
                    sum += diff * diff;
                }
                Ok(sum.sqrt())
            }
            DistanceMetric::Manhattan => Ok(a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()),
            DistanceMetric::Minkowski(p) => {
                if p < 1.0 {
                    return Err(VecindadError::configuration(format!(
                        "Minkowski parameter must be >= 1, got {p}"
                    )));
                }
                let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs().powf(p)).sum();
                Ok(sum.powf(1.0 / p))
            }
        }
    }
}

/// Metric distance between points `i` and `j` of `data`, with any failure
/// attributed to the pair.
pub(crate) fn checked_distance<M>(metric: &M, data: &DataSet, i: usize, j: usize) -> Result<f32>
where
    M: Metric + ?Sized,
{
    let d = metric
        .distance(data.point(i), data.point(j))
        .map_err(|e| VecindadError::MetricComputation {
            index_a: i,
            index_b: j,
            message: e.to_string(),
        })?;
    if !d.is_finite() {
        return Err(VecindadError::MetricComputation {
            index_a: i,
            index_b: j,
            message: format!("non-finite distance {d}"),
        });
    }
    Ok(d)
}

/// Thread configuration for pairwise distance computation.
///
/// `auto` uses the global thread pool; `with_threads` runs on a dedicated
/// pool of the given size. Without the `parallel` feature every computation
/// is serial and the requested thread count is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Parallelism {
    threads: Option<usize>,
}

impl Parallelism {
    /// Use the default (global) thread pool.
    #[must_use]
    pub fn auto() -> Self {
        Self { threads: None }
    }

    /// Use a dedicated pool with exactly `threads` workers.
    #[must_use]
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: Some(threads),
        }
    }

    /// The requested thread count, if any.
    #[must_use]
    pub fn threads(&self) -> Option<usize> {
        self.threads
    }
}
