//! k-nearest-neighbor sets and occurrence statistics.
//!
//! A [`NeighborSetFinder`] holds every point's k nearest neighbors together
//! with the occurrence statistics that drive hubness-aware learning: how
//! often each point appears in other points' lists, split by label agreement
//! and by the referencing point's class. In high-dimensional spaces the
//! occurrence distribution grows strongly right-skewed (Radovanović et al.,
//! 2010); the summary methods expose that skew directly.

mod search;

pub use search::{ExactSearch, NeighborSearch, SampledSearch};
pub(crate) use search::select_k_nearest;

use serde::{Deserialize, Serialize};

use crate::dataset::DataSet;
use crate::distance::{DistanceMatrix, Metric};
use crate::error::{Result, VecindadError};

/// Occurrence statistics of a neighbor set.
///
/// All counts are per point of the underlying set. For a freshly calculated
/// neighbor set the occurrence counts sum to `n * k`; statistics inherited
/// across an instance-selection reduction keep their pre-reduction values
/// and need not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborStats {
    occurrence: Vec<usize>,
    good: Vec<usize>,
    bad: Vec<usize>,
    class_occurrence: Vec<Vec<usize>>,
}

impl NeighborStats {
    /// Tallies occurrence statistics for the given lists and labels.
    fn count(lists: &[Vec<usize>], labels: &[i32], num_classes: usize) -> Self {
        let n = lists.len();
        let mut stats = Self {
            occurrence: vec![0; n],
            good: vec![0; n],
            bad: vec![0; n],
            class_occurrence: vec![vec![0; num_classes]; n],
        };
        for (owner, list) in lists.iter().enumerate() {
            let owner_label = labels[owner];
            for &p in list {
                stats.occurrence[p] += 1;
                if owner_label < 0 {
                    continue;
                }
                stats.class_occurrence[p][owner_label as usize] += 1;
                let p_label = labels[p];
                if p_label < 0 {
                    continue;
                }
                if p_label == owner_label {
                    stats.good[p] += 1;
                } else {
                    stats.bad[p] += 1;
                }
            }
        }
        stats
    }

    /// Number of points covered.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.occurrence.len()
    }

    /// Times point `p` occurs in other points' lists.
    #[must_use]
    pub fn occurrence(&self, p: usize) -> usize {
        self.occurrence[p]
    }

    /// Occurrences of `p` in lists of same-labeled points.
    #[must_use]
    pub fn good(&self, p: usize) -> usize {
        self.good[p]
    }

    /// Occurrences of `p` in lists of differently-labeled points.
    #[must_use]
    pub fn bad(&self, p: usize) -> usize {
        self.bad[p]
    }

    /// Occurrences of `p` in lists of points labeled `class`, 0 when the
    /// class is outside the tallied range.
    #[must_use]
    pub fn class_occurrence(&self, p: usize, class: usize) -> usize {
        self.class_occurrence[p].get(class).copied().unwrap_or(0)
    }

    /// All occurrence counts, by point index.
    #[must_use]
    pub fn occurrence_counts(&self) -> &[usize] {
        &self.occurrence
    }

    /// All good-occurrence counts, by point index.
    #[must_use]
    pub fn good_counts(&self) -> &[usize] {
        &self.good
    }

    /// All bad-occurrence counts, by point index.
    #[must_use]
    pub fn bad_counts(&self) -> &[usize] {
        &self.bad
    }

    /// Standardized third-moment skewness of the occurrence distribution.
    ///
    /// Returns 0.0 for empty or constant distributions.
    #[must_use]
    pub fn skewness(&self) -> f32 {
        let n = self.occurrence.len();
        if n == 0 {
            return 0.0;
        }
        let nf = n as f32;
        let mean = self.occurrence.iter().sum::<usize>() as f32 / nf;
        let variance = self
            .occurrence
            .iter()
            .map(|&o| {
                let d = o as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / nf;
        if variance == 0.0 {
            return 0.0;
        }
        let third = self
            .occurrence
            .iter()
            .map(|&o| {
                let d = o as f32 - mean;
                d * d * d
            })
            .sum::<f32>()
            / nf;
        third / variance.powf(1.5)
    }

    /// Points occurring more than `threshold_sd` standard deviations above
    /// the mean occurrence.
    #[must_use]
    pub fn hub_count(&self, threshold_sd: f32) -> usize {
        let n = self.occurrence.len();
        if n == 0 {
            return 0;
        }
        let nf = n as f32;
        let mean = self.occurrence.iter().sum::<usize>() as f32 / nf;
        let sd = (self
            .occurrence
            .iter()
            .map(|&o| {
                let d = o as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / nf)
            .sqrt();
        let cutoff = threshold_sd.mul_add(sd, mean);
        self.occurrence.iter().filter(|&&o| o as f32 > cutoff).count()
    }

    /// Points never occurring in any list.
    #[must_use]
    pub fn orphan_count(&self) -> usize {
        self.occurrence.iter().filter(|&&o| o == 0).count()
    }
}

/// Per-point k-nearest-neighbor lists with cached occurrence statistics.
///
/// Lists are sorted by increasing distance with equal distances resolving to
/// the lower index, so fixtures and re-runs are deterministic.
///
/// # Examples
///
/// ```
/// use vecindad::dataset::DataSet;
/// use vecindad::distance::{DistanceMatrix, DistanceMetric, Parallelism};
/// use vecindad::neighbors::NeighborSetFinder;
/// use vecindad::primitives::Matrix;
///
/// let features = Matrix::from_vec(6, 2, vec![
///     0.0, 0.0,  // class 0
///     0.0, 1.0,  // class 0
///     1.0, 0.0,  // class 0
///     5.0, 5.0,  // class 1
///     5.0, 6.0,  // class 1
///     6.0, 5.0,  // class 1
/// ]).expect("6x2 matrix");
/// let data = DataSet::new(features, vec![0, 0, 0, 1, 1, 1]).expect("matching labels");
/// let matrix = DistanceMatrix::compute(&data, &DistanceMetric::Euclidean, Parallelism::auto())
///     .expect("finite distances");
///
/// let finder = NeighborSetFinder::calculate(&matrix, &data, 2).expect("valid k");
/// assert_eq!(finder.neighbors(0), &[1, 2]);
///
/// // Every list slot is one occurrence.
/// let total: usize = (0..6).map(|p| finder.occurrence_count(p)).sum();
/// assert_eq!(total, 6 * 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborSetFinder {
    k: usize,
    lists: Vec<Vec<usize>>,
    labels: Vec<i32>,
    num_classes: usize,
    stats: NeighborStats,
}

impl NeighborSetFinder {
    /// Calculates exact neighbor sets from a precomputed distance matrix.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `k` is 0 or at least `n`, or if the matrix
    /// does not cover the data set.
    pub fn calculate(distances: &DistanceMatrix, data: &DataSet, k: usize) -> Result<Self> {
        Self::with_search(&ExactSearch::new(distances), data, k)
    }

    /// Calculates approximate neighbor sets without a full distance matrix.
    ///
    /// Only the sampled candidate pair distances are evaluated; see
    /// [`SampledSearch`] for the quality/cost trade-off.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` on an invalid `k` and `MetricComputation`
    /// when a sampled pair distance fails.
    pub fn approximate<M: Metric>(
        data: &DataSet,
        search: &SampledSearch<M>,
        k: usize,
    ) -> Result<Self> {
        Self::with_search(search, data, k)
    }

    /// Calculates neighbor sets with an arbitrary search strategy.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `k` is 0 or at least `n`, plus whatever
    /// the strategy reports.
    pub fn with_search<S>(search: &S, data: &DataSet, k: usize) -> Result<Self>
    where
        S: NeighborSearch + ?Sized,
    {
        let n = data.n_points();
        if k == 0 || k >= n {
            return Err(VecindadError::configuration(format!(
                "k must satisfy 1 <= k <= n - 1, got k = {k} with n = {n}"
            )));
        }
        let lists = search.neighbor_lists(data, k)?;
        let num_classes = data.num_classes();
        let stats = NeighborStats::count(&lists, data.labels(), num_classes);
        Ok(Self {
            k,
            lists,
            labels: data.labels().to_vec(),
            num_classes,
            stats,
        })
    }

    /// The neighborhood size.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of points covered.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.lists.len()
    }

    /// Labels the statistics were tallied under.
    #[must_use]
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Number of classes the statistics were tallied under.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// The k nearest neighbors of point `i`, nearest first.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.lists[i]
    }

    /// The cached occurrence statistics.
    #[must_use]
    pub fn stats(&self) -> &NeighborStats {
        &self.stats
    }

    /// Times point `p` occurs in other points' lists.
    #[must_use]
    pub fn occurrence_count(&self, p: usize) -> usize {
        self.stats.occurrence(p)
    }

    /// Occurrences of `p` in lists of same-labeled points.
    #[must_use]
    pub fn good_occurrence_count(&self, p: usize) -> usize {
        self.stats.good(p)
    }

    /// Occurrences of `p` in lists of differently-labeled points.
    #[must_use]
    pub fn bad_occurrence_count(&self, p: usize) -> usize {
        self.stats.bad(p)
    }

    /// Occurrences of `p` in lists of points labeled `class`.
    #[must_use]
    pub fn class_occurrence_count(&self, p: usize, class: usize) -> usize {
        self.stats.class_occurrence(p, class)
    }

    /// Skewness of the occurrence distribution; the hubness statistic.
    #[must_use]
    pub fn occurrence_skewness(&self) -> f32 {
        self.stats.skewness()
    }

    /// Points occurring more than `threshold_sd` standard deviations above
    /// the mean occurrence.
    #[must_use]
    pub fn hub_count(&self, threshold_sd: f32) -> usize {
        self.stats.hub_count(threshold_sd)
    }

    /// Points never occurring in any list.
    #[must_use]
    pub fn orphan_count(&self) -> usize {
        self.stats.orphan_count()
    }

    /// Derives the neighbor set for a smaller `k` by truncating each list
    /// and re-tallying all statistics. No distances are recomputed; the
    /// result is identical to a fresh calculation at the smaller `k`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `k` is 0 or exceeds the current `k`.
    pub fn sub_k(&self, k: usize) -> Result<NeighborSetFinder> {
        if k == 0 || k > self.k {
            return Err(VecindadError::configuration(format!(
                "sub-k must satisfy 1 <= k <= {}, got {k}",
                self.k
            )));
        }
        let lists: Vec<Vec<usize>> = self.lists.iter().map(|list| list[..k].to_vec()).collect();
        let stats = NeighborStats::count(&lists, &self.labels, self.num_classes);
        Ok(NeighborSetFinder {
            k,
            lists,
            labels: self.labels.clone(),
            num_classes: self.num_classes,
            stats,
        })
    }

    /// Re-tallies good/bad and class-conditional statistics under new
    /// labels. Neighbor lists are untouched; geometry does not depend on
    /// labeling.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the label count does not match.
    pub fn recompute_for_labels(&mut self, labels: &[i32]) -> Result<()> {
        if labels.len() != self.lists.len() {
            return Err(VecindadError::length_mismatch(
                "labels",
                self.lists.len(),
                labels.len(),
            ));
        }
        self.num_classes = labels
            .iter()
            .filter(|&&l| l >= 0)
            .max()
            .map_or(0, |&m| m as usize + 1);
        self.labels = labels.to_vec();
        self.stats = NeighborStats::count(&self.lists, &self.labels, self.num_classes);
        Ok(())
    }

    /// Copies the statistics of a kept subset of points, preserving the
    /// pre-reduction counts. Entry `i` of the result describes original
    /// point `kept[i]`.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn inherited_stats(&self, kept: &[usize]) -> NeighborStats {
        NeighborStats {
            occurrence: kept.iter().map(|&p| self.stats.occurrence[p]).collect(),
            good: kept.iter().map(|&p| self.stats.good[p]).collect(),
            bad: kept.iter().map(|&p| self.stats.bad[p]).collect(),
            class_occurrence: kept
                .iter()
                .map(|&p| self.stats.class_occurrence[p].clone())
                .collect(),
        }
    }

    /// Replaces the cached statistics, typically with counts inherited from
    /// a pre-reduction neighbor set.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the statistics cover a different number of
    /// points.
    pub fn with_stats_override(mut self, stats: NeighborStats) -> Result<Self> {
        if stats.n_points() != self.n_points() {
            return Err(VecindadError::length_mismatch(
                "statistics",
                self.n_points(),
                stats.n_points(),
            ));
        }
        self.stats = stats;
        Ok(self)
    }
}

#[cfg(test)]
#[path = "tests_neighbors_contract.rs"]
mod tests_neighbors_contract;
