//! Tabular data containers.
//!
//! [`Table`] is the columnar dataset consumed by the sampler; [`FeatureMatrix`]
//! is the dense numeric view consumed by the attributor and the scorer.
//! Reading tables from disk is left to the caller.

pub mod matrix;
pub mod table;

pub use matrix::FeatureMatrix;
pub use table::{Column, ColumnData, Table, TableBuilder, Value};
