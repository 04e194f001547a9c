//! Upper-triangular pairwise distance storage.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Metric, Parallelism};
use crate::dataset::DataSet;
use crate::error::{Result, VecindadError};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// All pairwise distances of a data set, stored upper-triangular.
///
/// Row `i` holds the distances from point `i` to points `i+1..n`, so each
/// unordered pair is stored exactly once and lookups are symmetric. The
/// diagonal is implicit and always zero.
///
/// # Examples
///
/// ```
/// use vecindad::dataset::DataSet;
/// use vecindad::distance::{DistanceMatrix, DistanceMetric, Parallelism};
/// use vecindad::primitives::Matrix;
///
/// let features = Matrix::from_vec(3, 1, vec![0.0, 1.0, 4.0]).expect("3x1 matrix");
/// let data = DataSet::new(features, vec![0, 0, 1]).expect("matching labels");
///
/// let matrix = DistanceMatrix::compute(&data, &DistanceMetric::Euclidean, Parallelism::auto())
///     .expect("finite distances");
/// assert_eq!(matrix.get(0, 2), 4.0);
/// assert_eq!(matrix.get(2, 0), 4.0);
/// assert_eq!(matrix.get(1, 1), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f32>>,
}

impl DistanceMatrix {
    /// Computes all pairwise distances of `data` under `metric`.
    ///
    /// Rows are partitioned across threads when the `parallel` feature is
    /// enabled; the result is identical to the serial computation.
    ///
    /// # Errors
    ///
    /// Returns `MetricComputation` identifying the offending pair when the
    /// metric fails or produces a non-finite value, and `Configuration` when
    /// a dedicated pool of zero threads is requested.
    pub fn compute<M>(data: &DataSet, metric: &M, parallelism: Parallelism) -> Result<Self>
    where
        M: Metric + ?Sized,
    {
        if parallelism.threads() == Some(0) {
            return Err(VecindadError::configuration(
                "thread count must be at least 1",
            ));
        }
        let rows = Self::compute_rows(data, metric, parallelism)?;
        Ok(Self { rows })
    }

    #[cfg(feature = "parallel")]
    fn compute_rows<M>(
        data: &DataSet,
        metric: &M,
        parallelism: Parallelism,
    ) -> Result<Vec<Vec<f32>>>
    where
        M: Metric + ?Sized,
    {
        let n = data.n_points();
        let par_rows = || {
            (0..n)
                .into_par_iter()
                .map(|i| Self::row_distances(data, metric, i))
                .collect::<Result<Vec<Vec<f32>>>>()
        };
        match parallelism.threads() {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        VecindadError::configuration(format!("thread pool setup failed: {e}"))
                    })?;
                pool.install(par_rows)
            }
            None => par_rows(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_rows<M>(
        data: &DataSet,
        metric: &M,
        _parallelism: Parallelism,
    ) -> Result<Vec<Vec<f32>>>
    where
        M: Metric + ?Sized,
    {
        (0..data.n_points())
            .map(|i| Self::row_distances(data, metric, i))
            .collect()
    }

    /// Distances from point `i` to every higher-indexed point.
    fn row_distances<M>(data: &DataSet, metric: &M, i: usize) -> Result<Vec<f32>>
    where
        M: Metric + ?Sized,
    {
        (i + 1..data.n_points())
            .map(|j| super::checked_distance(metric, data, i, j))
            .collect()
    }

    /// Builds a matrix directly from upper-triangular rows.
    ///
    /// Row `i` must hold the distances from point `i` to points `i+1..n`,
    /// where `n` is the number of rows.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if any row has the wrong length or contains a
    /// non-finite or negative entry.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let matrix = Self { rows };
        matrix.validate()?;
        Ok(matrix)
    }

    fn validate(&self) -> Result<()> {
        let n = self.rows.len();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != n - 1 - i {
                return Err(VecindadError::configuration(format!(
                    "row {i}: expected {} entries, got {}",
                    n - 1 - i,
                    row.len()
                )));
            }
            if let Some(d) = row.iter().find(|d| !d.is_finite() || **d < 0.0) {
                return Err(VecindadError::configuration(format!(
                    "row {i}: invalid distance {d}"
                )));
            }
        }
        Ok(())
    }

    /// Number of points the matrix covers.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.rows.len()
    }

    /// The distance between points `i` and `j`; zero on the diagonal.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is out of bounds.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        assert!(
            i < self.n_points() && j < self.n_points(),
            "pair ({i}, {j}) out of bounds for {} points",
            self.n_points()
        );
        if i == j {
            return 0.0;
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        self.rows[lo][hi - lo - 1]
    }

    /// Builds the sub-matrix covering the given points, in the order given.
    ///
    /// Local pair `(a, b)` in the result holds the distance between original
    /// points `indices[a]` and `indices[b]`, so restricting never recomputes
    /// a metric.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn restrict(&self, indices: &[usize]) -> DistanceMatrix {
        let m = indices.len();
        let rows = (0..m)
            .map(|a| {
                (a + 1..m)
                    .map(|b| self.get(indices[a], indices[b]))
                    .collect()
            })
            .collect();
        DistanceMatrix { rows }
    }

    /// Writes the matrix to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Io` on file errors and `Serialization` on encoding errors.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a matrix previously written by [`DistanceMatrix::save`].
    ///
    /// # Errors
    ///
    /// Returns `Io` on file errors, `Serialization` on malformed JSON, and
    /// `Configuration` when the decoded rows are not a valid triangle.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let matrix: DistanceMatrix = serde_json::from_reader(BufReader::new(file))?;
        matrix.validate()?;
        Ok(matrix)
    }
}
