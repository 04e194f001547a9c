//! Model selection: repeated stratified folds and the cross-validation
//! engine.
//!
//! This module provides tools for:
//! - Stratified train/test fold generation, repeated over shuffled runs
//! - Fold persistence, so experiment reruns share identical partitions
//! - Multi-classifier cross-validation with fold-local distance matrices,
//!   neighbor sets and optional instance-selection reduction

mod cross_validation;
mod folds;

pub use cross_validation::{
    ApproximateKnn, ClassifierOutcome, CrossValidation, CrossValidationConfig,
    CrossValidationReport, ReductionConfig,
};
pub use folds::{FoldAssignments, FoldCatalog, FoldSplit, RepeatedStratifiedFolds};

#[cfg(test)]
#[path = "tests_folds_contract.rs"]
mod tests_folds_contract;
