//! Neighbor-list search strategies.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::DataSet;
use crate::distance::{checked_distance, DistanceMatrix, Metric};
use crate::error::{Result, VecindadError};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A strategy producing the `k` nearest neighbors of every point.
///
/// Each list is sorted by increasing distance, never contains the point
/// itself, and resolves equal distances to the lower index.
pub trait NeighborSearch: Send + Sync {
    /// Computes all neighbor lists for `data`.
    ///
    /// # Errors
    ///
    /// Returns an error when a required pair distance cannot be evaluated.
    fn neighbor_lists(&self, data: &DataSet, k: usize) -> Result<Vec<Vec<usize>>>;
}

/// Exact search over a precomputed distance matrix.
///
/// Scans every candidate pair, so the resulting lists are the true `k`
/// nearest neighbors.
#[derive(Debug, Clone, Copy)]
pub struct ExactSearch<'a> {
    distances: &'a DistanceMatrix,
}

impl<'a> ExactSearch<'a> {
    /// Wraps a distance matrix as a search strategy.
    #[must_use]
    pub fn new(distances: &'a DistanceMatrix) -> Self {
        Self { distances }
    }

    fn nearest(&self, i: usize, k: usize) -> Vec<usize> {
        let n = self.distances.n_points();
        let candidates = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, self.distances.get(i, j)));
        select_k_nearest(candidates, k)
    }
}

impl NeighborSearch for ExactSearch<'_> {
    fn neighbor_lists(&self, data: &DataSet, k: usize) -> Result<Vec<Vec<usize>>> {
        let n = data.n_points();
        if self.distances.n_points() != n {
            return Err(VecindadError::length_mismatch(
                "distance matrix",
                n,
                self.distances.n_points(),
            ));
        }

        #[cfg(feature = "parallel")]
        let lists: Vec<Vec<usize>> = (0..n).into_par_iter().map(|i| self.nearest(i, k)).collect();

        #[cfg(not(feature = "parallel"))]
        let lists: Vec<Vec<usize>> = (0..n).map(|i| self.nearest(i, k)).collect();

        Ok(lists)
    }
}

/// Approximate search over a seeded random sample of candidate pairs.
///
/// For each point, `ceil(alpha * (n - 1))` candidates (but never fewer than
/// `k`) are drawn without replacement and only those pair distances are
/// evaluated, trading recall for metric calls. At `alpha = 1.0` every
/// candidate is examined in ascending index order, making the result
/// identical to [`ExactSearch`]. Candidate draws depend only on the seed and
/// the point index, so results are reproducible across thread counts.
#[derive(Debug, Clone)]
pub struct SampledSearch<M> {
    metric: M,
    alpha: f32,
    seed: u64,
}

impl<M: Metric> SampledSearch<M> {
    /// Creates a sampled search with quality parameter `alpha`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `alpha` is outside `(0, 1]`.
    pub fn new(metric: M, alpha: f32, seed: u64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(VecindadError::configuration(format!(
                "sample quality alpha must be in (0, 1], got {alpha}"
            )));
        }
        Ok(Self { metric, alpha, seed })
    }

    /// The configured quality parameter.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// The configured sampling seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn sampled_nearest(&self, data: &DataSet, i: usize, k: usize) -> Result<Vec<usize>> {
        let n = data.n_points();
        let m = (f64::from(self.alpha) * (n - 1) as f64).ceil() as usize;
        let m = m.clamp(k, n - 1);

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
        let mut candidates: Vec<usize> = rand::seq::index::sample(&mut rng, n - 1, m)
            .into_iter()
            .map(|v| if v < i { v } else { v + 1 })
            .collect();
        candidates.sort_unstable();

        let mut scored = Vec::with_capacity(m);
        for j in candidates {
            scored.push((j, checked_distance(&self.metric, data, i, j)?));
        }
        Ok(select_k_nearest(scored.into_iter(), k))
    }
}

impl<M: Metric> NeighborSearch for SampledSearch<M> {
    fn neighbor_lists(&self, data: &DataSet, k: usize) -> Result<Vec<Vec<usize>>> {
        let n = data.n_points();

        #[cfg(feature = "parallel")]
        let lists = (0..n)
            .into_par_iter()
            .map(|i| self.sampled_nearest(data, i, k))
            .collect::<Result<Vec<Vec<usize>>>>()?;

        #[cfg(not(feature = "parallel"))]
        let lists = (0..n)
            .map(|i| self.sampled_nearest(data, i, k))
            .collect::<Result<Vec<Vec<usize>>>>()?;

        Ok(lists)
    }
}

/// Keeps the `k` nearest of the candidates.
///
/// Candidates must arrive in ascending index order; equal distances then
/// resolve to the lower index because insertion is stable.
pub(crate) fn select_k_nearest(
    candidates: impl Iterator<Item = (usize, f32)>,
    k: usize,
) -> Vec<usize> {
    let mut indices: Vec<usize> = Vec::with_capacity(k + 1);
    let mut dists: Vec<f32> = Vec::with_capacity(k + 1);
    for (j, d) in candidates {
        if indices.len() == k && d >= dists[k - 1] {
            continue;
        }
        let pos = dists.partition_point(|&x| x <= d);
        indices.insert(pos, j);
        dists.insert(pos, d);
        if indices.len() > k {
            indices.pop();
            dists.pop();
        }
    }
    indices
}
