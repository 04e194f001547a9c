//! Repeated stratified fold generation and persistence.
//!
//! [`RepeatedStratifiedFolds`] partitions a labeled point set into
//! train/test folds that preserve class proportions, repeated over several
//! independently shuffled runs. [`FoldCatalog`] persists the resulting
//! assignments so repeated experiment invocations reuse identical
//! partitions.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VecindadError};

/// One train/test partition, as lists of original point indices.
///
/// Both lists are sorted ascending so the relative point order inside a
/// training view matches the original set, which keeps neighbor tie-breaks
/// reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSplit {
    /// Training indices.
    pub train: Vec<usize>,
    /// Test indices.
    pub test: Vec<usize>,
}

/// Complete fold assignments for one dataset: `runs[t][f]` is the split
/// for fold `f` of repetition `t`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldAssignments {
    n_times: usize,
    n_folds: usize,
    runs: Vec<Vec<FoldSplit>>,
}

impl FoldAssignments {
    /// Wraps pre-computed splits, checking the shape and that every split
    /// is a disjoint cover of the same index range.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the shape or partition property does
    /// not hold.
    pub fn new(n_times: usize, n_folds: usize, runs: Vec<Vec<FoldSplit>>) -> Result<Self> {
        let assignments = Self {
            n_times,
            n_folds,
            runs,
        };
        assignments.validate()?;
        Ok(assignments)
    }

    /// Number of repetitions.
    #[must_use]
    pub fn n_times(&self) -> usize {
        self.n_times
    }

    /// Number of folds per repetition.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Number of points these assignments partition.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.runs
            .first()
            .and_then(|run| run.first())
            .map_or(0, |split| split.train.len() + split.test.len())
    }

    /// All splits, outer index run, inner index fold.
    #[must_use]
    pub fn runs(&self) -> &[Vec<FoldSplit>] {
        &self.runs
    }

    /// The split for one (run, fold) cell.
    ///
    /// # Panics
    ///
    /// Panics if `run` or `fold` is out of range.
    #[must_use]
    pub fn split(&self, run: usize, fold: usize) -> &FoldSplit {
        assert!(run < self.n_times, "run {run} out of range {}", self.n_times);
        assert!(
            fold < self.n_folds,
            "fold {fold} out of range {}",
            self.n_folds
        );
        &self.runs[run][fold]
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_times == 0 {
            return Err(VecindadError::configuration(
                "fold assignments need at least one run",
            ));
        }
        if self.n_folds < 2 {
            return Err(VecindadError::configuration(
                "fold assignments need at least 2 folds",
            ));
        }
        if self.runs.len() != self.n_times {
            return Err(VecindadError::length_mismatch(
                "fold runs",
                self.n_times,
                self.runs.len(),
            ));
        }
        let n = self.n_points();
        for (t, run) in self.runs.iter().enumerate() {
            if run.len() != self.n_folds {
                return Err(VecindadError::length_mismatch(
                    "folds in run",
                    self.n_folds,
                    run.len(),
                ));
            }
            for (f, split) in run.iter().enumerate() {
                let mut union: Vec<usize> = split
                    .train
                    .iter()
                    .chain(split.test.iter())
                    .copied()
                    .collect();
                union.sort_unstable();
                if union.len() != n || union.iter().enumerate().any(|(i, &v)| i != v) {
                    return Err(VecindadError::configuration(format!(
                        "run {t} fold {f}: train and test do not partition 0..{n}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Repeated stratified fold generator.
///
/// Each of `n_times` repetitions shuffles every class's index pool with a
/// run-specific seed and deals it across `n_folds` groups proportionally;
/// each group in turn is the test fold against the union of the rest. A
/// repetition whose folds leave any class absent from either the train or
/// the test side is resampled, up to `max_retries` attempts.
///
/// # Examples
///
/// ```
/// use vecindad::model_selection::RepeatedStratifiedFolds;
///
/// let labels = vec![0, 0, 0, 0, 1, 1, 1, 1];
/// let folds = RepeatedStratifiedFolds::new(2, 2).with_random_state(42);
/// let assignments = folds.generate(&labels).expect("both classes span both folds");
///
/// assert_eq!(assignments.runs().len(), 2);
/// for run in assignments.runs() {
///     for split in run {
///         assert_eq!(split.train.len() + split.test.len(), labels.len());
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RepeatedStratifiedFolds {
    n_times: usize,
    n_folds: usize,
    random_state: Option<u64>,
    max_retries: usize,
}

impl RepeatedStratifiedFolds {
    /// Creates a generator for `n_times` repetitions of `n_folds` folds.
    #[must_use]
    pub fn new(n_times: usize, n_folds: usize) -> Self {
        Self {
            n_times,
            n_folds,
            random_state: None,
            max_retries: 100,
        }
    }

    /// Sets the base seed; run `t` shuffles with seed `base + t`.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Sets how often a repetition is resampled before giving up.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Generates stratified fold assignments for `labels`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when `n_times` is zero, `n_folds` is below 2
    /// or exceeds the number of points, or any label is negative
    /// (unlabeled). Returns `DegenerateData` when some repetition cannot
    /// cover every class on both sides within `max_retries` attempts.
    pub fn generate(&self, labels: &[i32]) -> Result<FoldAssignments> {
        let n = labels.len();
        if self.n_times == 0 {
            return Err(VecindadError::configuration(
                "at least one repetition is required",
            ));
        }
        if self.n_folds < 2 {
            return Err(VecindadError::configuration(format!(
                "at least 2 folds are required, got {}",
                self.n_folds
            )));
        }
        if self.n_folds > n {
            return Err(VecindadError::configuration(format!(
                "{} folds cannot partition {n} points",
                self.n_folds
            )));
        }
        if let Some(i) = labels.iter().position(|&label| label < 0) {
            return Err(VecindadError::configuration(format!(
                "point {i} is unlabeled; stratified folds require fully labeled data"
            )));
        }

        let num_classes = labels.iter().copied().max().map_or(0, |m| m as usize + 1);
        let mut class_pools: Vec<Vec<usize>> = vec![Vec::new(); num_classes];
        for (i, &label) in labels.iter().enumerate() {
            class_pools[label as usize].push(i);
        }
        let present: Vec<bool> = class_pools.iter().map(|pool| !pool.is_empty()).collect();

        let mut runs = Vec::with_capacity(self.n_times);
        for run in 0..self.n_times {
            let mut rng = match self.random_state {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(run as u64)),
                None => StdRng::from_entropy(),
            };

            let mut accepted = None;
            for _ in 0..self.max_retries {
                for pool in &mut class_pools {
                    pool.shuffle(&mut rng);
                }
                let splits = deal_folds(&class_pools, self.n_folds, n);
                if covers_all_classes(&splits, labels, &present) {
                    accepted = Some(splits);
                    break;
                }
            }
            let Some(splits) = accepted else {
                return Err(VecindadError::DegenerateData {
                    message: format!(
                        "run {run}: no stratified {}-fold split covered every class \
                         in both train and test after {} attempts",
                        self.n_folds, self.max_retries
                    ),
                });
            };
            runs.push(splits);
        }

        FoldAssignments::new(self.n_times, self.n_folds, runs)
    }
}

/// Deals each class pool across `n_folds` groups proportionally; the
/// remainder goes to the first folds.
fn deal_folds(class_pools: &[Vec<usize>], n_folds: usize, n_points: usize) -> Vec<FoldSplit> {
    let mut fold_members: Vec<Vec<usize>> = vec![Vec::new(); n_folds];
    for pool in class_pools {
        let base = pool.len() / n_folds;
        let remainder = pool.len() % n_folds;
        let mut start = 0;
        for (f, members) in fold_members.iter_mut().enumerate() {
            let size = if f < remainder { base + 1 } else { base };
            members.extend_from_slice(&pool[start..start + size]);
            start += size;
        }
    }

    (0..n_folds)
        .map(|f| {
            let mut test = fold_members[f].clone();
            test.sort_unstable();
            let mut train = Vec::with_capacity(n_points - test.len());
            for (g, members) in fold_members.iter().enumerate() {
                if g != f {
                    train.extend_from_slice(members);
                }
            }
            train.sort_unstable();
            FoldSplit { train, test }
        })
        .collect()
}

fn covers_all_classes(splits: &[FoldSplit], labels: &[i32], present: &[bool]) -> bool {
    splits.iter().all(|split| {
        let mut in_train = vec![false; present.len()];
        let mut in_test = vec![false; present.len()];
        for &i in &split.train {
            in_train[labels[i] as usize] = true;
        }
        for &i in &split.test {
            in_test[labels[i] as usize] = true;
        }
        present
            .iter()
            .enumerate()
            .all(|(c, &p)| !p || (in_train[c] && in_test[c]))
    })
}

/// Persisted fold assignments, keyed by dataset name and fold geometry.
///
/// The catalog round-trips through JSON so an experiment rerun against the
/// same dataset reuses bit-identical partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldCatalog {
    entries: Vec<FoldCatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FoldCatalogEntry {
    dataset: String,
    n_times: usize,
    n_folds: usize,
    assignments: FoldAssignments,
}

impl FoldCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no assignments are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `assignments` under `(dataset, n_times, n_folds)`, replacing
    /// any previous entry with the same key.
    pub fn insert(&mut self, dataset: &str, assignments: FoldAssignments) {
        let n_times = assignments.n_times();
        let n_folds = assignments.n_folds();
        self.entries.retain(|entry| {
            entry.dataset != dataset || entry.n_times != n_times || entry.n_folds != n_folds
        });
        self.entries.push(FoldCatalogEntry {
            dataset: dataset.to_string(),
            n_times,
            n_folds,
            assignments,
        });
    }

    /// Looks up the assignments stored under `(dataset, n_times, n_folds)`.
    #[must_use]
    pub fn get(&self, dataset: &str, n_times: usize, n_folds: usize) -> Option<&FoldAssignments> {
        self.entries
            .iter()
            .find(|entry| {
                entry.dataset == dataset && entry.n_times == n_times && entry.n_folds == n_folds
            })
            .map(|entry| &entry.assignments)
    }

    /// Writes the catalog to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Io` on file errors and `Serialization` on encoding errors.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a catalog previously written by [`FoldCatalog::save`].
    ///
    /// # Errors
    ///
    /// Returns `Io` on file errors, `Serialization` on malformed JSON, and
    /// `Configuration` when a stored entry is not a valid partition or its
    /// key disagrees with its assignments.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let catalog: FoldCatalog = serde_json::from_reader(BufReader::new(file))?;
        for entry in &catalog.entries {
            entry.assignments.validate()?;
            if entry.n_times != entry.assignments.n_times()
                || entry.n_folds != entry.assignments.n_folds()
            {
                return Err(VecindadError::configuration(format!(
                    "catalog entry '{}' key disagrees with its assignments",
                    entry.dataset
                )));
            }
        }
        Ok(catalog)
    }
}
