//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use vecindad::prelude::*;
//! ```

pub use crate::primitives::Matrix;
pub use crate::error::{Result, VecindadError};
pub use crate::dataset::DataSet;
pub use crate::distance::{DistanceMatrix, DistanceMetric, Metric, Parallelism};
pub use crate::neighbors::{NeighborSetFinder, NeighborStats, SampledSearch};
pub use crate::classification::{
    Classifier, HubnessMode, HubnessWeightedKnn, InstanceSelector, PriorClassifier, RandomSelector,
};
pub use crate::metrics::{accuracy, ClassificationEstimates, ClassificationEstimator};
pub use crate::model_selection::{
    ApproximateKnn, CrossValidation, CrossValidationConfig, CrossValidationReport, FoldCatalog,
    ReductionConfig, RepeatedStratifiedFolds,
};
