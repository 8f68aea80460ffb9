//! Core configuration structures and builder for anomalyze.

use crate::core::constants::*;
use crate::core::error::{AnomalyzeError, Result};
use crate::config_error;
use crate::core::types::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Parameters of the deterministic sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Plate identifier column
    pub plate_column: String,
    /// Well identifier column
    pub well_column: String,
    /// Additional columns that identify a cell within a well
    pub cell_id_columns: Vec<String>,
    /// Size of the bucket space fingerprints are reduced into
    pub bucket_space: u64,
    /// Separator between key columns in the hashed key string
    pub key_separator: String,
    /// Whole-table or per-group sampling
    pub mode: SamplingMode,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            plate_column: DEFAULT_PLATE_COLUMN.to_string(),
            well_column: DEFAULT_WELL_COLUMN.to_string(),
            cell_id_columns: DEFAULT_CELL_ID_COLUMNS.iter().map(|c| c.to_string()).collect(),
            bucket_space: DEFAULT_BUCKET_SPACE,
            key_separator: DEFAULT_KEY_SEPARATOR.to_string(),
            mode: DEFAULT_SAMPLING_MODE,
        }
    }
}

impl SamplingConfig {
    /// All key columns in hashing order: plate, well, then cell-id columns.
    pub fn key_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.plate_column.as_str(), self.well_column.as_str()];
        columns.extend(self.cell_id_columns.iter().map(String::as_str));
        columns
    }
}

/// Parameters of the isolation path attributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Number of worker threads (0 = all available cores)
    pub num_threads: usize,
    /// Reporting of features never split on along a sample's paths
    pub absent_policy: AbsentPolicy,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        AttributionConfig {
            num_threads: DEFAULT_NUM_THREADS,
            absent_policy: DEFAULT_ABSENT_POLICY,
        }
    }
}

impl AttributionConfig {
    /// Get the effective number of threads (0 means use all available cores)
    pub fn effective_num_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }
}

/// Parameters of anomaly scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Offset subtracted from raw scores to obtain the decision function
    pub offset: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            offset: DEFAULT_SCORE_OFFSET,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name prefix of metadata columns; every other column is a feature
    pub metadata_prefix: String,
    /// Sampler parameters
    pub sampling: SamplingConfig,
    /// Attributor parameters
    pub attribution: AttributionConfig,
    /// Scoring parameters
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            sampling: SamplingConfig::default(),
            attribution: AttributionConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.sampling.bucket_space < 2 {
            return Err(AnomalyzeError::invalid_parameter(
                "sampling.bucket_space",
                self.sampling.bucket_space.to_string(),
                "must be at least 2",
            ));
        }

        if self.sampling.plate_column.is_empty() || self.sampling.well_column.is_empty() {
            return Err(AnomalyzeError::invalid_parameter(
                "sampling.plate_column/well_column",
                format!(
                    "{:?}/{:?}",
                    self.sampling.plate_column, self.sampling.well_column
                ),
                "column names must not be empty",
            ));
        }

        let keys = self.sampling.key_columns();
        for (i, column) in keys.iter().enumerate() {
            if keys[..i].contains(column) {
                return Err(AnomalyzeError::invalid_parameter(
                    "sampling.cell_id_columns",
                    column.to_string(),
                    "key columns must be distinct",
                ));
            }
        }

        if !self.scoring.offset.is_finite() {
            return Err(AnomalyzeError::invalid_parameter(
                "scoring.offset",
                self.scoring.offset.to_string(),
                "must be finite",
            ));
        }

        if self.attribution.num_threads > num_cpus::get() * 2 {
            log::warn!(
                "num_threads ({}) is much larger than available cores ({})",
                self.attribution.num_threads,
                num_cpus::get()
            );
        }

        Ok(())
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error!("Failed to read config file: {}", e))?;

        let config: Config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(AnomalyzeError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a `.toml` or `.json` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self).map_err(|e| {
                config_error!("Failed to serialize to TOML: {}", e)
            })?,
            _ => {
                return Err(AnomalyzeError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn load_from_environment() -> Result<Self> {
        let mut config = Config::default();
        config.apply_environment_overrides()?;
        Ok(config)
    }

    /// Apply `ANOMALYZE_*` environment variable overrides to this configuration
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("ANOMALYZE_NUM_THREADS") {
            self.attribution.num_threads = val
                .parse()
                .map_err(|_| AnomalyzeError::config("Invalid ANOMALYZE_NUM_THREADS"))?;
        }

        if let Ok(val) = std::env::var("ANOMALYZE_BUCKET_SPACE") {
            self.sampling.bucket_space = val
                .parse()
                .map_err(|_| AnomalyzeError::config("Invalid ANOMALYZE_BUCKET_SPACE"))?;
        }

        if let Ok(val) = std::env::var("ANOMALYZE_SAMPLING_MODE") {
            self.sampling.mode = val.parse()?;
        }

        self.validate()
    }

    /// Get configuration as a parameter map (for logging)
    pub fn as_parameter_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("metadata_prefix".to_string(), self.metadata_prefix.clone());
        map.insert(
            "sampling.plate_column".to_string(),
            self.sampling.plate_column.clone(),
        );
        map.insert(
            "sampling.well_column".to_string(),
            self.sampling.well_column.clone(),
        );
        map.insert(
            "sampling.cell_id_columns".to_string(),
            self.sampling.cell_id_columns.join(","),
        );
        map.insert(
            "sampling.bucket_space".to_string(),
            self.sampling.bucket_space.to_string(),
        );
        map.insert("sampling.mode".to_string(), self.sampling.mode.to_string());
        map.insert(
            "attribution.num_threads".to_string(),
            self.attribution.num_threads.to_string(),
        );
        map.insert(
            "attribution.absent_policy".to_string(),
            self.attribution.absent_policy.to_string(),
        );
        map.insert("scoring.offset".to_string(), self.scoring.offset.to_string());

        map
    }
}

/// Configuration builder for fluent configuration creation
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
    validation_errors: Vec<String>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Set the metadata column prefix
    pub fn metadata_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.metadata_prefix = prefix.into();
        self
    }

    /// Set the plate column
    pub fn plate_column<S: Into<String>>(mut self, column: S) -> Self {
        self.config.sampling.plate_column = column.into();
        self
    }

    /// Set the well column
    pub fn well_column<S: Into<String>>(mut self, column: S) -> Self {
        self.config.sampling.well_column = column.into();
        self
    }

    /// Set the cell-identity columns
    pub fn cell_id_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sampling.cell_id_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the bucket space size
    pub fn bucket_space(mut self, buckets: u64) -> Self {
        if buckets < 2 {
            self.validation_errors
                .push("bucket_space must be at least 2".to_string());
        }
        self.config.sampling.bucket_space = buckets;
        self
    }

    /// Set the key separator
    pub fn key_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.config.sampling.key_separator = separator.into();
        self
    }

    /// Set the sampling mode
    pub fn sampling_mode(mut self, mode: SamplingMode) -> Self {
        self.config.sampling.mode = mode;
        self
    }

    /// Set number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.attribution.num_threads = threads;
        self
    }

    /// Set the absent policy
    pub fn absent_policy(mut self, policy: AbsentPolicy) -> Self {
        self.config.attribution.absent_policy = policy;
        self
    }

    /// Set the decision function offset
    pub fn score_offset(mut self, offset: f64) -> Self {
        if !offset.is_finite() {
            self.validation_errors
                .push("score offset must be finite".to_string());
        }
        self.config.scoring.offset = offset;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if !self.validation_errors.is_empty() {
            return Err(AnomalyzeError::config(self.validation_errors.join("; ")));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sampling.bucket_space, 10_000);
        assert_eq!(
            config.sampling.key_columns(),
            vec![
                "Metadata_Plate",
                "Metadata_Well",
                "Metadata_Site",
                "Metadata_ObjectNumber"
            ]
        );
    }

    #[test]
    fn test_builder() {
        let config = ConfigBuilder::new()
            .plate_column("plate")
            .well_column("well")
            .cell_id_columns(["object"])
            .bucket_space(1000)
            .num_threads(2)
            .absent_policy(AbsentPolicy::Absent)
            .build()
            .unwrap();

        assert_eq!(config.sampling.key_columns(), vec!["plate", "well", "object"]);
        assert_eq!(config.sampling.bucket_space, 1000);
        assert_eq!(config.attribution.effective_num_threads(), 2);
        assert_eq!(config.attribution.absent_policy, AbsentPolicy::Absent);
    }

    #[test]
    fn test_builder_collects_errors() {
        let result = ConfigBuilder::new()
            .bucket_space(1)
            .score_offset(f64::NAN)
            .build();
        let message = result.unwrap_err().to_string();
        assert!(message.contains("bucket_space"));
        assert!(message.contains("offset"));
    }

    #[test]
    fn test_duplicate_key_columns_rejected() {
        let result = ConfigBuilder::new()
            .cell_id_columns(["Metadata_Well"])
            .build();
        assert!(matches!(
            result,
            Err(AnomalyzeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[sampling]\nbucket_space = 500\n").unwrap();
        assert_eq!(config.sampling.bucket_space, 500);
        assert_eq!(config.sampling.plate_column, DEFAULT_PLATE_COLUMN);
        assert_eq!(config.attribution, AttributionConfig::default());
    }

    #[test]
    fn test_effective_threads() {
        let config = AttributionConfig::default();
        assert!(config.effective_num_threads() >= 1);
    }
}
