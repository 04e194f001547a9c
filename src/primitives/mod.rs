//! Core numeric primitives.
//!
//! A single row-major `Matrix<T>` carries feature tables, confusion counts
//! and fuzzy-vote tables throughout the crate.

mod matrix;

pub use matrix::Matrix;
