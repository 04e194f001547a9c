//! Classifier interfaces and reference implementations.
//!
//! The evaluation engine consumes classifiers through the [`Classifier`]
//! trait. What a classifier needs from its training context is declared
//! up front in a [`Capabilities`] descriptor read once at registration,
//! so the engine branches on recorded flags instead of probing types at
//! every call site. Two reference implementations ship with the crate:
//! [`PriorClassifier`] (class-prior baseline, no capabilities) and
//! [`HubnessWeightedKnn`] (hw-kNN, Tomašev et al., 2014), which exercises
//! the distance-matrix and neighbor-set paths end to end.

mod selection;

pub use selection::{HubnessMode, InstanceSelector, RandomSelector, Reduction};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dataset::DataSet;
use crate::distance::{DistanceMatrix, DistanceMetric, Metric};
use crate::error::{Result, VecindadError};
use crate::neighbors::{select_k_nearest, NeighborSetFinder};

/// What a classifier needs from the fold-local evaluation context.
///
/// Captured once when the classifier is registered; the engine never
/// re-queries it per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Wants the fold-local pairwise distance matrix installed.
    pub needs_distance_matrix: bool,
    /// Wants the fold-local neighbor sets installed.
    pub needs_neighbor_sets: bool,
    /// Consumes discretized features rather than continuous ones.
    pub discrete_input: bool,
}

/// A trainable classifier over labeled point sets.
///
/// Implementations must be `Send`; the engine moves per-fold clones onto
/// worker threads.
pub trait Classifier: Send {
    /// Short stable identifier, used in logs and reports.
    fn name(&self) -> &str;

    /// What this classifier needs from the evaluation context.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Number of classes the trained model distinguishes; 0 before
    /// training.
    fn num_classes(&self) -> usize;

    /// Fits the classifier to a fully labeled training set.
    ///
    /// # Errors
    ///
    /// Returns an error when the training set is unusable or a declared
    /// capability was not installed beforehand.
    fn train(&mut self, data: &DataSet) -> Result<()>;

    /// Predicts the class of a feature vector.
    ///
    /// # Errors
    ///
    /// Returns an error when called before training or when the point
    /// cannot be scored.
    fn classify(&self, point: &[f32]) -> Result<usize>;

    /// Predicts a per-class probability vector of length `num_classes`.
    ///
    /// The default is a one-hot encoding of [`Classifier::classify`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`Classifier::classify`].
    fn classify_probabilistically(&self, point: &[f32]) -> Result<Vec<f32>> {
        let class = self.classify(point)?;
        let mut votes = vec![0.0; self.num_classes()];
        if let Some(slot) = votes.get_mut(class) {
            *slot = 1.0;
        }
        Ok(votes)
    }

    /// Installs the fold-local distance matrix. Default: ignored.
    fn set_distance_matrix(&mut self, _distances: Arc<DistanceMatrix>) {}

    /// Installs the fold-local neighbor sets. Default: ignored.
    fn set_neighbor_sets(&mut self, _neighbors: Arc<NeighborSetFinder>) {}

    /// A fresh boxed copy, used to give every fold its own instance.
    fn clone_boxed(&self) -> Box<dyn Classifier>;
}

/// Baseline classifier predicting the majority training class.
///
/// Probabilistic output is the vector of class priors. Useful as a floor
/// for comparisons and as the minimal capability-free classifier.
///
/// # Examples
///
/// ```
/// use vecindad::classification::{Classifier, PriorClassifier};
/// use vecindad::dataset::DataSet;
/// use vecindad::primitives::Matrix;
///
/// let features = Matrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).expect("4x1 matrix");
/// let data = DataSet::new(features, vec![1, 1, 1, 0]).expect("matching labels");
///
/// let mut prior = PriorClassifier::new();
/// prior.train(&data).expect("labeled training set");
/// assert_eq!(prior.classify(&[9.9]).expect("trained"), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PriorClassifier {
    priors: Option<Vec<f32>>,
    majority: Option<usize>,
}

impl PriorClassifier {
    /// Creates an untrained prior classifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for PriorClassifier {
    fn name(&self) -> &str {
        "prior"
    }

    fn num_classes(&self) -> usize {
        self.priors.as_ref().map_or(0, Vec::len)
    }

    fn train(&mut self, data: &DataSet) -> Result<()> {
        let counts = data.class_counts();
        let total: usize = counts.iter().sum();
        if total == 0 {
            return Err(VecindadError::configuration(
                "training set has no labeled points",
            ));
        }
        // Ties resolve to the lower class index.
        let majority = counts
            .iter()
            .enumerate()
            .max_by(|(ca, a), (cb, b)| a.cmp(b).then(cb.cmp(ca)))
            .map(|(class, _)| class)
            .unwrap_or(0);
        self.priors = Some(
            counts
                .iter()
                .map(|&c| c as f32 / total as f32)
                .collect(),
        );
        self.majority = Some(majority);
        Ok(())
    }

    fn classify(&self, _point: &[f32]) -> Result<usize> {
        self.majority
            .ok_or_else(|| VecindadError::configuration("classifier has not been trained"))
    }

    fn classify_probabilistically(&self, _point: &[f32]) -> Result<Vec<f32>> {
        self.priors
            .clone()
            .ok_or_else(|| VecindadError::configuration("classifier has not been trained"))
    }

    fn clone_boxed(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

/// Hubness-weighted k-nearest-neighbor classifier (hw-kNN).
///
/// Each training point's vote is scaled by `exp(-h)` where `h` is its
/// standardized bad-occurrence count, so points that routinely appear as
/// wrong-labeled neighbors lose influence. Fuzzy votes follow the
/// neighbor's smoothed class-conditional occurrence profile and fall back
/// to its crisp label when the point never occurs in any list.
///
/// Declares `needs_distance_matrix` and `needs_neighbor_sets`; the engine
/// installs both before training. Test points are scored by computing
/// metric distances to the stored training points.
#[derive(Debug, Clone)]
pub struct HubnessWeightedKnn {
    k: usize,
    metric: DistanceMetric,
    smoothing: f32,
    train_data: Option<DataSet>,
    num_classes: usize,
    vote_weights: Vec<f32>,
    fuzzy_profiles: Vec<Vec<f32>>,
    distances: Option<Arc<DistanceMatrix>>,
    neighbors: Option<Arc<NeighborSetFinder>>,
}

impl HubnessWeightedKnn {
    /// Creates an untrained hw-kNN classifier with `k` voting neighbors,
    /// Euclidean distance and Laplace smoothing of 1.0.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            metric: DistanceMetric::Euclidean,
            smoothing: 1.0,
            train_data: None,
            num_classes: 0,
            vote_weights: Vec::new(),
            fuzzy_profiles: Vec::new(),
            distances: None,
            neighbors: None,
        }
    }

    /// Sets the distance metric used to score test points.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the Laplace smoothing applied to class-conditional profiles.
    #[must_use]
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// The configured neighborhood size.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Smoothed class profile of training point `i`, or its crisp label
    /// when the point occurs in no list.
    fn profile_for(&self, neighbors: &NeighborSetFinder, i: usize, label: usize) -> Vec<f32> {
        let occurrences = neighbors.occurrence_count(i);
        if occurrences == 0 {
            let mut crisp = vec![0.0; self.num_classes];
            crisp[label] = 1.0;
            return crisp;
        }
        let denom = occurrences as f32 + self.smoothing * self.num_classes as f32;
        (0..self.num_classes)
            .map(|c| (neighbors.class_occurrence_count(i, c) as f32 + self.smoothing) / denom)
            .collect()
    }
}

impl Classifier for HubnessWeightedKnn {
    fn name(&self) -> &str {
        "hw-knn"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            needs_distance_matrix: true,
            needs_neighbor_sets: true,
            discrete_input: false,
        }
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn train(&mut self, data: &DataSet) -> Result<()> {
        if self.k == 0 {
            return Err(VecindadError::configuration("k must be at least 1"));
        }
        if !data.is_fully_labeled() || data.n_points() == 0 {
            return Err(VecindadError::configuration(
                "hw-knn training requires a non-empty, fully labeled set",
            ));
        }
        let neighbors = self
            .neighbors
            .clone()
            .ok_or_else(|| VecindadError::configuration("neighbor sets were not installed"))?;
        if neighbors.n_points() != data.n_points() {
            return Err(VecindadError::length_mismatch(
                "neighbor sets",
                data.n_points(),
                neighbors.n_points(),
            ));
        }
        if let Some(distances) = &self.distances {
            if distances.n_points() != data.n_points() {
                return Err(VecindadError::length_mismatch(
                    "distance matrix",
                    data.n_points(),
                    distances.n_points(),
                ));
            }
        }

        self.num_classes = data.num_classes();

        // Standardized bad occurrence drives the vote weight: hubs that
        // often carry the wrong label are damped by exp(-h).
        let bad = neighbors.stats().bad_counts();
        let n = bad.len() as f32;
        let mean = bad.iter().sum::<usize>() as f32 / n;
        let sd = (bad
            .iter()
            .map(|&b| {
                let d = b as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / n)
            .sqrt();
        self.vote_weights = bad
            .iter()
            .map(|&b| {
                if sd == 0.0 {
                    1.0
                } else {
                    (-((b as f32 - mean) / sd)).exp()
                }
            })
            .collect();

        self.fuzzy_profiles = (0..data.n_points())
            .map(|i| self.profile_for(&neighbors, i, data.label(i) as usize))
            .collect();
        self.train_data = Some(data.clone());
        Ok(())
    }

    fn classify(&self, point: &[f32]) -> Result<usize> {
        let votes = self.classify_probabilistically(point)?;
        let mut best = 0;
        for (class, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = class;
            }
        }
        Ok(best)
    }

    fn classify_probabilistically(&self, point: &[f32]) -> Result<Vec<f32>> {
        let data = self
            .train_data
            .as_ref()
            .ok_or_else(|| VecindadError::configuration("classifier has not been trained"))?;

        let k = self.k.min(data.n_points());
        let mut scored = Vec::with_capacity(data.n_points());
        for j in 0..data.n_points() {
            let d = self.metric.distance(point, data.point(j))?;
            if !d.is_finite() {
                return Err(VecindadError::Other(format!(
                    "non-finite distance to training point {j}"
                )));
            }
            scored.push((j, d));
        }
        let nearest = select_k_nearest(scored.into_iter(), k);

        let mut votes = vec![0.0f32; self.num_classes];
        for &j in &nearest {
            let weight = self.vote_weights[j];
            for (c, vote) in votes.iter_mut().enumerate() {
                *vote += weight * self.fuzzy_profiles[j][c];
            }
        }
        let total: f32 = votes.iter().sum();
        if total > 0.0 {
            for vote in &mut votes {
                *vote /= total;
            }
        }
        Ok(votes)
    }

    fn set_distance_matrix(&mut self, distances: Arc<DistanceMatrix>) {
        self.distances = Some(distances);
    }

    fn set_neighbor_sets(&mut self, neighbors: Arc<NeighborSetFinder>) {
        self.neighbors = Some(neighbors);
    }

    fn clone_boxed(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
