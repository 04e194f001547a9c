//! Instance selection for training-set reduction.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::dataset::DataSet;
use crate::error::{Result, VecindadError};
use crate::neighbors::NeighborSetFinder;

/// How a reduced training set's occurrence statistics are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubnessMode {
    /// Pre-reduction statistics are carried onto the reduced neighbor set.
    Given,
    /// Statistics are recomputed from the reduced set alone.
    Recomputed,
}

/// Result of reducing a training set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    /// Kept point indices, local to the reduced training set, ascending.
    pub kept: Vec<usize>,
    /// Statistics regime the evaluation engine applies to the reduced
    /// neighbor sets.
    pub hubness: HubnessMode,
}

/// Chooses which training points survive reduction.
///
/// The neighbor sets of the unreduced training view are offered when
/// available so hubness-aware selectors can rank points by occurrence;
/// selectors that ignore them take `None` in stride.
pub trait InstanceSelector: Send {
    /// Short stable identifier, used in logs.
    fn name(&self) -> &str;

    /// Picks the surviving subset of `train`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` on an unusable `keep_ratio` or an empty
    /// training set.
    fn reduce(
        &self,
        train: &DataSet,
        neighbors: Option<&NeighborSetFinder>,
        keep_ratio: f32,
    ) -> Result<Reduction>;
}

/// Seeded random instance selector.
///
/// Retains `ceil(keep_ratio * n)` points, always covering every class
/// present in the training set with at least one point.
#[derive(Debug, Clone, Copy)]
pub struct RandomSelector {
    seed: u64,
    hubness: HubnessMode,
}

impl RandomSelector {
    /// Creates a selector with recomputed hubness statistics.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            hubness: HubnessMode::Recomputed,
        }
    }

    /// Sets the hubness regime reported with each reduction.
    #[must_use]
    pub fn with_hubness_mode(mut self, hubness: HubnessMode) -> Self {
        self.hubness = hubness;
        self
    }
}

impl InstanceSelector for RandomSelector {
    fn name(&self) -> &str {
        "random"
    }

    fn reduce(
        &self,
        train: &DataSet,
        _neighbors: Option<&NeighborSetFinder>,
        keep_ratio: f32,
    ) -> Result<Reduction> {
        if !(keep_ratio > 0.0 && keep_ratio <= 1.0) {
            return Err(VecindadError::configuration(format!(
                "keep ratio must be in (0, 1], got {keep_ratio}"
            )));
        }
        let n = train.n_points();
        if n == 0 {
            return Err(VecindadError::configuration(
                "cannot reduce an empty training set",
            ));
        }

        let class_counts = train.class_counts();
        let classes_present = class_counts.iter().filter(|&&c| c > 0).count();
        let target = ((f64::from(keep_ratio) * n as f64).ceil() as usize)
            .max(classes_present)
            .min(n);

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        // First shuffled representative of every class survives, then the
        // remaining slots fill in shuffle order.
        let mut kept = Vec::with_capacity(target);
        let mut covered = vec![false; class_counts.len()];
        for &i in &order {
            let label = train.label(i);
            if label >= 0 && !covered[label as usize] {
                covered[label as usize] = true;
                kept.push(i);
            }
        }
        for &i in &order {
            if kept.len() == target {
                break;
            }
            if !kept.contains(&i) {
                kept.push(i);
            }
        }
        kept.sort_unstable();

        Ok(Reduction {
            kept,
            hubness: self.hubness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Matrix;

    fn skewed_set() -> DataSet {
        let features = Matrix::from_vec(10, 1, (0..10).map(|i| i as f32).collect())
            .expect("10x1 matrix");
        DataSet::new(features, vec![0, 0, 0, 0, 0, 0, 1, 1, 2, 2]).expect("matching labels")
    }

    #[test]
    fn test_reduce_is_deterministic() {
        let data = skewed_set();
        let selector = RandomSelector::new(42);
        let a = selector.reduce(&data, None, 0.5).expect("valid ratio");
        let b = selector.reduce(&data, None, 0.5).expect("valid ratio");
        assert_eq!(a, b);
    }

    #[test]
    fn test_reduce_keeps_ceil_count() {
        let data = skewed_set();
        let selector = RandomSelector::new(7);
        let reduction = selector.reduce(&data, None, 0.25).expect("valid ratio");
        // ceil(0.25 * 10) = 3, which also covers the three classes.
        assert_eq!(reduction.kept.len(), 3);
    }

    #[test]
    fn test_reduce_covers_every_class() {
        let data = skewed_set();
        for seed in 0..20 {
            let selector = RandomSelector::new(seed);
            let reduction = selector.reduce(&data, None, 0.3).expect("valid ratio");
            let mut seen = [false; 3];
            for &i in &reduction.kept {
                seen[data.label(i) as usize] = true;
            }
            assert!(
                seen.iter().all(|&s| s),
                "seed {seed} left a class uncovered: {:?}",
                reduction.kept
            );
        }
    }

    #[test]
    fn test_reduce_kept_sorted_unique_in_range() {
        let data = skewed_set();
        let reduction = RandomSelector::new(3)
            .reduce(&data, None, 0.7)
            .expect("valid ratio");
        let mut sorted = reduction.kept.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(reduction.kept, sorted);
        assert!(reduction.kept.iter().all(|&i| i < data.n_points()));
    }

    #[test]
    fn test_reduce_full_ratio_keeps_all() {
        let data = skewed_set();
        let reduction = RandomSelector::new(1)
            .reduce(&data, None, 1.0)
            .expect("valid ratio");
        assert_eq!(reduction.kept, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_reduce_rejects_bad_ratio() {
        let data = skewed_set();
        let selector = RandomSelector::new(0);
        assert!(selector.reduce(&data, None, 0.0).is_err());
        assert!(selector.reduce(&data, None, 1.5).is_err());
    }

    #[test]
    fn test_hubness_mode_propagates() {
        let data = skewed_set();
        let reduction = RandomSelector::new(0)
            .with_hubness_mode(HubnessMode::Given)
            .reduce(&data, None, 0.5)
            .expect("valid ratio");
        assert_eq!(reduction.hubness, HubnessMode::Given);
    }
}
