//! Vecindad: hubness-aware k-nearest-neighbor analysis and
//! cross-validation in pure Rust.
//!
//! In high-dimensional spaces the distribution of how often points appear
//! as nearest neighbors of others grows strongly right-skewed: a few hub
//! points dominate the neighbor lists while many points occur in none.
//! Vecindad computes the pairwise distance matrices and k-nearest-neighbor
//! occurrence statistics behind that phenomenon, and drives repeated
//! stratified cross-validation over pluggable classifiers that consume
//! them.
//!
//! # Quick Start
//!
//! ```
//! use vecindad::prelude::*;
//!
//! // Two separated clusters.
//! let features = Matrix::from_vec(6, 2, vec![
//!     0.0, 0.0,
//!     0.0, 1.0,
//!     1.0, 0.0,
//!     5.0, 5.0,
//!     5.0, 6.0,
//!     6.0, 5.0,
//! ]).expect("6x2 matrix");
//! let data = DataSet::new(features, vec![0, 0, 0, 1, 1, 1]).expect("matching labels");
//!
//! let matrix = DistanceMatrix::compute(&data, &DistanceMetric::Euclidean, Parallelism::auto())
//!     .expect("finite distances");
//! let neighbors = NeighborSetFinder::calculate(&matrix, &data, 2).expect("valid k");
//!
//! // Every neighbor relation stays within its cluster.
//! assert_eq!(neighbors.stats().bad_counts().iter().sum::<usize>(), 0);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core row-major Matrix type
//! - [`dataset`]: Labeled point sets and index-remapped views
//! - [`distance`]: Distance metrics and pairwise distance matrices
//! - [`neighbors`]: k-nearest-neighbor sets and hubness statistics
//! - [`classification`]: Classifier interfaces, hw-kNN, instance selection
//! - [`metrics`]: Confusion-matrix classification estimators
//! - [`model_selection`]: Stratified folds and the cross-validation engine
//! - [`error`]: Error taxonomy shared across the crate

pub mod classification;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod metrics;
pub mod model_selection;
pub mod neighbors;
pub mod prelude;
pub mod primitives;

pub use error::{Result, VecindadError};
pub use primitives::Matrix;
