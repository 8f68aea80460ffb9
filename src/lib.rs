//! # anomalyze
//!
//! Reproducible sampling and isolation-forest feature attribution for
//! single-cell morphology profiles.
//!
//! ## Features
//!
//! - **Deterministic sampling**: rows are kept or dropped by a stable FarmHash
//!   fingerprint of their plate, well and cell identifiers, so a sample can be
//!   redrawn bit-for-bit on another machine, in another run, or over one chunk
//!   of a larger table.
//! - **Isolation path attribution**: per-sample, per-feature credit for how
//!   much each split feature shortened the sample's isolation path, averaged
//!   over the forest.
//! - **Anomaly scoring**: scikit-learn compatible `score_samples`,
//!   `decision_function` and `predict` over the same forest.
//! - **Parallel processing**: per-tree tasks on a rayon pool, combined by
//!   map-then-reduce.
//!
//! ## Quick Start
//!
//! ```rust
//! use anomalyze::{
//!     DeterministicSampler, FeatureMatrix, IsolationForest, IsolationPathAttributor,
//!     IsolationTree, SamplingConfig, Table,
//! };
//!
//! # fn main() -> anomalyze::Result<()> {
//! let cells = Table::builder()
//!     .text("Metadata_Plate", vec!["P1", "P1", "P1", "P1"])
//!     .text("Metadata_Well", vec!["A01", "A01", "B02", "B02"])
//!     .int("Metadata_Site", vec![1, 1, 1, 2])
//!     .int("Metadata_ObjectNumber", vec![1, 2, 1, 1])
//!     .float("Cells_AreaShape_Area", vec![120.0, 95.5, 300.25, 101.0])
//!     .build()?;
//!
//! let sampler = DeterministicSampler::new(SamplingConfig::default())?;
//! let sample = sampler.sample(&cells, 2)?;
//! assert!(sample.table.num_rows() <= cells.num_rows());
//!
//! let mut tree = IsolationTree::new(4);
//! tree.split_node(0, 0, 200.0, 3, 1)?;
//! let forest = IsolationForest::builder()
//!     .tree(tree)
//!     .feature_names(["Cells_AreaShape_Area"])
//!     .build()?;
//!
//! let features = cells.feature_matrix(&["Cells_AreaShape_Area"])?;
//! let mut attributor = IsolationPathAttributor::new(&forest, &features);
//! let importances = attributor.compute()?;
//! assert_eq!(importances.num_samples(), 4);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module - always available
pub mod core;

// Configuration management module
pub mod config;

// Tabular data containers
pub mod dataset;

// Deterministic sampling
pub mod sampling;

// Fitted trees and forests
pub mod tree;

// Feature attribution
pub mod attribution;

// Anomaly scores
pub mod scoring;

// Re-export core functionality for convenience
pub use core::{
    constants::*,
    error::{AnomalyzeError, Result},
    types::*,
};

// Re-export configuration functionality
pub use config::{AttributionConfig, Config, ConfigBuilder, SamplingConfig, ScoringConfig};

// Re-export dataset functionality
pub use dataset::{Column, ColumnData, FeatureMatrix, Table, TableBuilder, Value};

// Re-export sampling functionality
pub use sampling::{
    DegenerateGroupWarning, DeterministicSampler, FarmHashFingerprint, Fingerprinter,
    SampleOutcome,
};

// Re-export tree functionality
pub use tree::{
    expected_path_length, expected_path_lengths, ForestArrays, ForestBuilder, IsolationForest,
    IsolationTree, IsolationTreeView, TreeArrays, TreeNode,
};

// Re-export attribution functionality
pub use attribution::{compute_importances, ImportanceTable, IsolationPathAttributor};

// Version information
pub use core::constants::ANOMALYZE_VERSION as VERSION;

/// Initialize the library.
///
/// Installs the `env_logger` backend for the `log` facade. Calling it is
/// optional; without it log records are simply discarded.
///
/// # Examples
///
/// ```rust
/// fn main() -> anomalyze::Result<()> {
///     anomalyze::init()?;
///     assert!(anomalyze::is_initialized());
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    core::initialize_core()
}

/// Check if the library has been initialized.
pub fn is_initialized() -> bool {
    core::is_core_initialized()
}
