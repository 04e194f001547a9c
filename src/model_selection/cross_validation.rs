//! Multi-run cross-validation engine.
//!
//! [`CrossValidation`] drives, for every (run, fold) cell of a repeated
//! stratified split, a train/test cycle for each registered classifier.
//! Fold-local distance matrices and neighbor sets are built once per fold
//! and shared read-only; per-classifier results land in private buffers
//! that a single-threaded merge step folds into the aggregates in
//! registration order, so reports are deterministic regardless of task
//! completion order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::classification::{Capabilities, Classifier, HubnessMode, InstanceSelector};
use crate::dataset::DataSet;
use crate::distance::{DistanceMatrix, DistanceMetric, Parallelism};
use crate::error::{Result, VecindadError};
use crate::metrics::ClassificationEstimator;
use crate::neighbors::{NeighborSetFinder, SampledSearch};
use crate::primitives::Matrix;

use super::folds::{FoldAssignments, FoldSplit, RepeatedStratifiedFolds};

/// Approximate neighbor-set parameters for fold-local derivation.
///
/// When configured, each fold re-derives training neighbor sets through a
/// [`SampledSearch`] with quality `alpha` instead of restricting the full
/// distance matrix. The seed is offset per (run, fold) so folds sample
/// independently but reproducibly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproximateKnn {
    /// Fraction of candidate pairs examined per point, in `(0, 1]`.
    pub alpha: f32,
    /// Base sampling seed.
    pub seed: u64,
}

impl ApproximateKnn {
    /// Creates approximate-kNN parameters.
    #[must_use]
    pub fn new(alpha: f32, seed: u64) -> Self {
        Self { alpha, seed }
    }
}

/// Instance-selection parameters applied to each training fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionConfig {
    /// Fraction of training points retained, in `(0, 1]`.
    pub keep_ratio: f32,
}

impl ReductionConfig {
    /// Creates a reduction configuration.
    #[must_use]
    pub fn new(keep_ratio: f32) -> Self {
        Self { keep_ratio }
    }
}

/// Configuration of one cross-validation experiment.
#[derive(Debug, Clone)]
pub struct CrossValidationConfig {
    n_times: usize,
    n_folds: usize,
    random_state: Option<u64>,
    k: usize,
    parallelism: Parallelism,
    approximate: Option<ApproximateKnn>,
    reduction: Option<ReductionConfig>,
}

impl CrossValidationConfig {
    /// Creates a configuration for `n_times` repetitions of `n_folds`
    /// folds with neighborhood size `k`, unseeded and serial defaults.
    #[must_use]
    pub fn new(n_times: usize, n_folds: usize, k: usize) -> Self {
        Self {
            n_times,
            n_folds,
            random_state: None,
            k,
            parallelism: Parallelism::auto(),
            approximate: None,
            reduction: None,
        }
    }

    /// Seeds fold generation for reproducible partitions.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Sets the thread count shared by matrix computation and
    /// per-classifier fold tasks.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Derives fold-local neighbor sets approximately instead of from the
    /// restricted full-set matrix.
    #[must_use]
    pub fn with_approximate(mut self, approximate: ApproximateKnn) -> Self {
        self.approximate = Some(approximate);
        self
    }

    /// Reduces each training fold through the engine's instance selector
    /// before training.
    #[must_use]
    pub fn with_reduction(mut self, reduction: ReductionConfig) -> Self {
        self.reduction = Some(reduction);
        self
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

    /// Neighborhood size used for fold-local neighbor sets.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }
}

/// Everything the report records about one registered classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierOutcome {
    /// Classifier name, as registered.
    pub name: String,
    /// Cell-wise mean confusion matrix over all non-missing (run, fold)
    /// cells; `None` when every cell is missing.
    pub averaged: Option<ClassificationEstimator>,
    /// The full estimator table, outer index run, inner index fold;
    /// `None` marks a missing combination.
    pub per_fold: Vec<Vec<Option<ClassificationEstimator>>>,
    /// Mean fold accuracy over non-missing cells.
    pub accuracy_mean: f32,
    /// Population standard deviation of fold accuracies.
    pub accuracy_std: f32,
    /// Per-point fuzzy votes in original index order, `n x num_classes`,
    /// averaged over the times each point was tested. Rows of points this
    /// classifier never scored stay zero.
    pub fuzzy_votes: Matrix<f32>,
    /// Cumulative training wall time across all cells.
    pub train_time: Duration,
    /// Cumulative classification wall time across all cells.
    pub test_time: Duration,
    /// The (run, fold) combinations where this classifier failed.
    pub missing: Vec<(usize, usize)>,
}

/// Aggregated results of a finished cross-validation, one entry per
/// registered classifier in registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    /// Number of repetitions evaluated.
    pub n_times: usize,
    /// Number of folds per repetition.
    pub n_folds: usize,
    /// Per-classifier outcomes in registration order.
    pub outcomes: Vec<ClassifierOutcome>,
}

impl CrossValidationReport {
    /// The outcome of the first classifier registered under `name`.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&ClassifierOutcome> {
        self.outcomes.iter().find(|outcome| outcome.name == name)
    }
}

struct RegisteredClassifier {
    name: String,
    capabilities: Capabilities,
    classifier: Box<dyn Classifier>,
}

/// Repeated stratified cross-validation over a set of classifiers.
///
/// The engine is consumed by [`CrossValidation::run`], which walks the
/// lifecycle once: generate (or adopt) folds, build shared context, then
/// for every (run, fold) train and test every classifier.
///
/// # Examples
///
/// ```
/// use vecindad::classification::PriorClassifier;
/// use vecindad::dataset::DataSet;
/// use vecindad::distance::DistanceMetric;
/// use vecindad::model_selection::{CrossValidation, CrossValidationConfig};
/// use vecindad::primitives::Matrix;
///
/// let features = Matrix::from_vec(8, 1, (0..8).map(|i| i as f32).collect()).expect("8x1 matrix");
/// let data = DataSet::new(features, vec![0, 1, 0, 1, 0, 1, 0, 1]).expect("matching labels");
///
/// let config = CrossValidationConfig::new(2, 2, 1).with_random_state(7);
/// let mut cv = CrossValidation::new(data, DistanceMetric::Euclidean, config);
/// cv.register(Box::new(PriorClassifier::new())).expect("continuous inputs");
///
/// let report = cv.run().expect("valid configuration");
/// let outcome = report.outcome("prior").expect("registered classifier");
/// assert!(outcome.missing.is_empty());
/// assert_eq!(outcome.per_fold.len(), 2);
/// ```
pub struct CrossValidation {
    data: DataSet,
    metric: DistanceMetric,
    config: CrossValidationConfig,
    classifiers: Vec<RegisteredClassifier>,
    selector: Option<Box<dyn InstanceSelector>>,
    external_folds: Option<FoldAssignments>,
}

impl CrossValidation {
    /// Creates an engine for `data` under `metric` and `config`.
    #[must_use]
    pub fn new(data: DataSet, metric: DistanceMetric, config: CrossValidationConfig) -> Self {
        Self {
            data,
            metric,
            config,
            classifiers: Vec::new(),
            selector: None,
            external_folds: None,
        }
    }

    /// Sets the instance selector engaged when reduction is configured.
    #[must_use]
    pub fn with_selector(mut self, selector: Box<dyn InstanceSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Reuses previously generated fold assignments instead of generating
    /// fresh ones.
    #[must_use]
    pub fn with_external_folds(mut self, assignments: FoldAssignments) -> Self {
        self.external_folds = Some(assignments);
        self
    }

    /// Registers a classifier, capturing its capability descriptor once.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for classifiers that consume discretized
    /// inputs; the engine feeds continuous features only.
    pub fn register(&mut self, classifier: Box<dyn Classifier>) -> Result<()> {
        let capabilities = classifier.capabilities();
        if capabilities.discrete_input {
            return Err(VecindadError::configuration(format!(
                "classifier '{}' consumes discretized inputs, which this engine does not produce",
                classifier.name()
            )));
        }
        self.classifiers.push(RegisteredClassifier {
            name: classifier.name().to_string(),
            capabilities,
            classifier,
        });
        Ok(())
    }

    /// Number of registered classifiers.
    #[must_use]
    pub fn classifier_count(&self) -> usize {
        self.classifiers.len()
    }

    /// Runs the full experiment and aggregates the report.
    ///
    /// A classifier failing inside one (run, fold) cell is logged and
    /// recorded as missing; fold generation, distance computation and
    /// neighbor-set derivation failures are fatal.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` on unusable parameters (no classifiers,
    /// bad `k`, unlabeled points, mismatched external folds, reduction
    /// without a selector), `DegenerateData` when stratified folds cannot
    /// cover every class, and any error from building shared context.
    pub fn run(self) -> Result<CrossValidationReport> {
        let Self {
            data,
            metric,
            config,
            classifiers,
            selector,
            external_folds,
        } = self;

        if classifiers.is_empty() {
            return Err(VecindadError::configuration(
                "at least one classifier must be registered",
            ));
        }
        let n = data.n_points();
        if n == 0 {
            return Err(VecindadError::configuration(
                "cannot cross-validate an empty point set",
            ));
        }
        if !data.is_fully_labeled() {
            return Err(VecindadError::configuration(
                "cross-validation requires fully labeled data",
            ));
        }
        if config.k == 0 || config.k >= n {
            return Err(VecindadError::configuration(format!(
                "k must satisfy 1 <= k <= n - 1, got k = {} with n = {n}",
                config.k
            )));
        }
        if config.parallelism.threads() == Some(0) {
            return Err(VecindadError::configuration(
                "thread count must be at least 1",
            ));
        }
        if let Some(reduction) = &config.reduction {
            if !(reduction.keep_ratio > 0.0 && reduction.keep_ratio <= 1.0) {
                return Err(VecindadError::configuration(format!(
                    "keep ratio must be in (0, 1], got {}",
                    reduction.keep_ratio
                )));
            }
            if selector.is_none() {
                return Err(VecindadError::configuration(
                    "reduction configured without an instance selector",
                ));
            }
        }
        if let Some(approx) = &config.approximate {
            SampledSearch::new(metric, approx.alpha, approx.seed)?;
        }

        let num_classes = data.num_classes();
        let needs_matrix = classifiers
            .iter()
            .any(|c| c.capabilities.needs_distance_matrix);
        let needs_neighbors = classifiers
            .iter()
            .any(|c| c.capabilities.needs_neighbor_sets);

        let assignments = match external_folds {
            Some(assignments) => {
                if assignments.n_times() != config.n_times
                    || assignments.n_folds() != config.n_folds
                {
                    return Err(VecindadError::configuration(format!(
                        "external folds are {}x{} but the configuration asks for {}x{}",
                        assignments.n_times(),
                        assignments.n_folds(),
                        config.n_times,
                        config.n_folds
                    )));
                }
                if assignments.n_points() != n {
                    return Err(VecindadError::length_mismatch(
                        "external fold assignments",
                        n,
                        assignments.n_points(),
                    ));
                }
                assignments
            }
            None => {
                let mut generator = RepeatedStratifiedFolds::new(config.n_times, config.n_folds);
                if let Some(seed) = config.random_state {
                    generator = generator.with_random_state(seed);
                }
                generator.generate(data.labels())?
            }
        };

        log::info!(
            "cross-validating {} classifiers over {}x{} folds ({n} points, {num_classes} classes)",
            classifiers.len(),
            config.n_times,
            config.n_folds
        );

        // The full-set matrix backs fold restriction; approximate mode
        // skips it unless some classifier wants the matrix itself.
        let full_matrix = if needs_matrix || (needs_neighbors && config.approximate.is_none()) {
            Some(DistanceMatrix::compute(&data, &metric, config.parallelism)?)
        } else {
            None
        };

        let runner = TaskRunner::new(config.parallelism)?;
        let mut aggregates: Vec<FoldAggregate> = classifiers
            .iter()
            .map(|_| FoldAggregate::new(config.n_times, config.n_folds, n, num_classes))
            .collect();

        for (run, folds) in assignments.runs().iter().enumerate() {
            for (fold, split) in folds.iter().enumerate() {
                log::debug!(
                    "run {run} fold {fold}: {} train / {} test points",
                    split.train.len(),
                    split.test.len()
                );
                let context = build_fold_context(
                    &data,
                    metric,
                    &config,
                    selector.as_deref(),
                    full_matrix.as_ref(),
                    needs_neighbors,
                    split,
                    run * config.n_folds + fold,
                )?;

                let prepared: Vec<(Box<dyn Classifier>, &str)> = classifiers
                    .iter()
                    .map(|registered| {
                        let mut model = registered.classifier.clone_boxed();
                        if registered.capabilities.needs_distance_matrix {
                            if let Some(matrix) = &context.matrix {
                                model.set_distance_matrix(Arc::clone(matrix));
                            }
                        }
                        if registered.capabilities.needs_neighbor_sets {
                            if let Some(neighbors) = &context.neighbors {
                                model.set_neighbor_sets(Arc::clone(neighbors));
                            }
                        }
                        (model, registered.name.as_str())
                    })
                    .collect();

                let results = runner.run(prepared, &context, &data, &split.test, num_classes);

                // Single-threaded merge in registration order.
                for ((registered, aggregate), result) in
                    classifiers.iter().zip(&mut aggregates).zip(results)
                {
                    match result {
                        Ok(cell) => aggregate.absorb(run, fold, cell),
                        Err(err) => {
                            log::warn!(
                                "classifier '{}' failed on run {run} fold {fold}: {err}",
                                registered.name
                            );
                            aggregate.missing.push((run, fold));
                        }
                    }
                }
            }
        }

        let mut outcomes = Vec::with_capacity(classifiers.len());
        for (registered, aggregate) in classifiers.iter().zip(aggregates) {
            outcomes.push(aggregate.finish(&registered.name, n, num_classes)?);
        }
        Ok(CrossValidationReport {
            n_times: config.n_times,
            n_folds: config.n_folds,
            outcomes,
        })
    }
}

/// Shared, immutable evaluation context for one fold.
struct FoldContext {
    train: DataSet,
    matrix: Option<Arc<DistanceMatrix>>,
    neighbors: Option<Arc<NeighborSetFinder>>,
}

/// Builds the training view, fold-local matrix and neighbor sets for one
/// split, applying instance-selection reduction when configured.
#[allow(clippy::too_many_arguments)]
fn build_fold_context(
    data: &DataSet,
    metric: DistanceMetric,
    config: &CrossValidationConfig,
    selector: Option<&dyn InstanceSelector>,
    full_matrix: Option<&DistanceMatrix>,
    needs_neighbors: bool,
    split: &FoldSplit,
    fold_ordinal: usize,
) -> Result<FoldContext> {
    let mut train = data.subset(&split.train);
    let mut matrix = full_matrix.map(|full| full.restrict(&split.train));

    let mut neighbors = if needs_neighbors {
        Some(derive_neighbors(
            &train,
            matrix.as_ref(),
            metric,
            config,
            fold_ordinal,
        )?)
    } else {
        None
    };

    if let (Some(reduction), Some(selector)) = (&config.reduction, selector) {
        let picked = selector.reduce(&train, neighbors.as_ref(), reduction.keep_ratio)?;
        let reduced = train.subset(&picked.kept);
        matrix = matrix.map(|m| m.restrict(&picked.kept));
        if let Some(before) = neighbors {
            let rebuilt = derive_neighbors(&reduced, matrix.as_ref(), metric, config, fold_ordinal)?;
            neighbors = Some(match picked.hubness {
                HubnessMode::Recomputed => rebuilt,
                HubnessMode::Given => {
                    rebuilt.with_stats_override(before.inherited_stats(&picked.kept))?
                }
            });
        }
        train = reduced;
    }

    Ok(FoldContext {
        train,
        matrix: matrix.map(Arc::new),
        neighbors: neighbors.map(Arc::new),
    })
}

/// Fold-local neighbor sets: sampled approximately when configured, else
/// exact from the restricted matrix.
fn derive_neighbors(
    view: &DataSet,
    matrix: Option<&DistanceMatrix>,
    metric: DistanceMetric,
    config: &CrossValidationConfig,
    fold_ordinal: usize,
) -> Result<NeighborSetFinder> {
    match &config.approximate {
        Some(approx) => {
            let search = SampledSearch::new(
                metric,
                approx.alpha,
                approx.seed.wrapping_add(fold_ordinal as u64),
            )?;
            NeighborSetFinder::approximate(view, &search, config.k)
        }
        None => match matrix {
            Some(matrix) => NeighborSetFinder::calculate(matrix, view, config.k),
            None => Err(VecindadError::configuration(
                "neighbor sets requested without a distance matrix",
            )),
        },
    }
}

/// Private per-(classifier, fold) result, merged single-threaded.
struct FoldCell {
    estimator: ClassificationEstimator,
    fuzzy: Vec<(usize, Vec<f32>)>,
    train_time: Duration,
    test_time: Duration,
}

/// Trains one per-fold model clone and scores every test point.
fn evaluate_fold_task(
    mut model: Box<dyn Classifier>,
    name: &str,
    context: &FoldContext,
    data: &DataSet,
    test: &[usize],
    num_classes: usize,
) -> Result<FoldCell> {
    let train_start = Instant::now();
    model
        .train(&context.train)
        .map_err(|e| VecindadError::classifier_failure(name, &e))?;
    let train_time = train_start.elapsed();

    let test_start = Instant::now();
    let mut estimator = ClassificationEstimator::new(num_classes);
    let mut fuzzy = Vec::with_capacity(test.len());
    for &original in test {
        let votes = model
            .classify_probabilistically(data.point(original))
            .map_err(|e| VecindadError::classifier_failure(name, &e))?;
        if votes.len() != num_classes {
            return Err(VecindadError::ClassifierFailure {
                classifier: name.to_string(),
                message: format!("returned {} votes for {num_classes} classes", votes.len()),
            });
        }
        estimator.record(data.label(original) as usize, argmax(&votes));
        fuzzy.push((original, votes));
    }
    Ok(FoldCell {
        estimator,
        fuzzy,
        train_time,
        test_time: test_start.elapsed(),
    })
}

/// Index of the strictly greatest vote; ties keep the lower class.
fn argmax(votes: &[f32]) -> usize {
    let mut best = 0;
    for (class, &vote) in votes.iter().enumerate().skip(1) {
        if vote > votes[best] {
            best = class;
        }
    }
    best
}

/// Runs per-classifier fold tasks on the configured thread count.
struct TaskRunner {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl TaskRunner {
    #[cfg(feature = "parallel")]
    fn new(parallelism: Parallelism) -> Result<Self> {
        let pool = match parallelism.threads() {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        VecindadError::configuration(format!("thread pool setup failed: {e}"))
                    })?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    #[cfg(not(feature = "parallel"))]
    fn new(_parallelism: Parallelism) -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(feature = "parallel")]
    fn run(
        &self,
        prepared: Vec<(Box<dyn Classifier>, &str)>,
        context: &FoldContext,
        data: &DataSet,
        test: &[usize],
        num_classes: usize,
    ) -> Vec<Result<FoldCell>> {
        use rayon::prelude::*;

        let work = || {
            prepared
                .into_par_iter()
                .map(|(model, name)| {
                    evaluate_fold_task(model, name, context, data, test, num_classes)
                })
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run(
        &self,
        prepared: Vec<(Box<dyn Classifier>, &str)>,
        context: &FoldContext,
        data: &DataSet,
        test: &[usize],
        num_classes: usize,
    ) -> Vec<Result<FoldCell>> {
        prepared
            .into_iter()
            .map(|(model, name)| evaluate_fold_task(model, name, context, data, test, num_classes))
            .collect()
    }
}

/// Per-classifier running aggregate across all (run, fold) cells.
struct FoldAggregate {
    per_fold: Vec<Vec<Option<ClassificationEstimator>>>,
    fuzzy_sum: Matrix<f32>,
    tested: Vec<usize>,
    train_time: Duration,
    test_time: Duration,
    missing: Vec<(usize, usize)>,
}

impl FoldAggregate {
    fn new(n_times: usize, n_folds: usize, n_points: usize, num_classes: usize) -> Self {
        Self {
            per_fold: vec![vec![None; n_folds]; n_times],
            fuzzy_sum: Matrix::zeros(n_points, num_classes),
            tested: vec![0; n_points],
            train_time: Duration::ZERO,
            test_time: Duration::ZERO,
            missing: Vec::new(),
        }
    }

    fn absorb(&mut self, run: usize, fold: usize, cell: FoldCell) {
        for (original, votes) in &cell.fuzzy {
            for (class, &vote) in votes.iter().enumerate() {
                let current = self.fuzzy_sum.get(*original, class);
                self.fuzzy_sum.set(*original, class, current + vote);
            }
            self.tested[*original] += 1;
        }
        self.train_time += cell.train_time;
        self.test_time += cell.test_time;
        self.per_fold[run][fold] = Some(cell.estimator);
    }

    fn finish(self, name: &str, n_points: usize, num_classes: usize) -> Result<ClassifierOutcome> {
        let FoldAggregate {
            per_fold,
            mut fuzzy_sum,
            tested,
            train_time,
            test_time,
            missing,
        } = self;

        let collected: Vec<ClassificationEstimator> = per_fold
            .iter()
            .flat_map(|run| run.iter())
            .filter_map(|cell| cell.clone())
            .collect();
        let averaged = if collected.is_empty() {
            None
        } else {
            Some(ClassificationEstimator::average(&collected)?)
        };
        let (accuracy_mean, accuracy_std) =
            ClassificationEstimator::metric_spread(&collected, ClassificationEstimator::accuracy);

        for p in 0..n_points {
            if tested[p] > 0 {
                for class in 0..num_classes {
                    let mean = fuzzy_sum.get(p, class) / tested[p] as f32;
                    fuzzy_sum.set(p, class, mean);
                }
            }
        }

        Ok(ClassifierOutcome {
            name: name.to_string(),
            averaged,
            per_fold,
            accuracy_mean,
            accuracy_std,
            fuzzy_votes: fuzzy_sum,
            train_time,
            test_time,
            missing,
        })
    }
}
