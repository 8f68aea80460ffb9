//! Configuration management for anomalyze.
//!
//! Configuration is plain serde data, loadable from TOML or JSON files and
//! overridable through `ANOMALYZE_*` environment variables.

pub mod core;

pub use self::core::{AttributionConfig, Config, ConfigBuilder, SamplingConfig, ScoringConfig};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "anomalyze.toml";
