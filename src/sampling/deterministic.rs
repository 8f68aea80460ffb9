//! Deterministic, hash-based stratified sampling.
//!
//! Every row is mapped to a bucket in `[0, B)` by fingerprinting the
//! concatenated rendering of its key columns (plate, well, cell-id columns).
//! A row is kept when its bucket is below `round(target / group_size * B)`.
//! No random generator is involved: the decision for a row depends only on its
//! key, so re-running on reordered input, on a different machine, or on one
//! chunk of a larger table gives the same answer for that row.

use crate::config::SamplingConfig;
use crate::core::error::{AnomalyzeError, Result};
use crate::core::types::{Bucket, RowIndex, SamplingMode};
use crate::dataset::Table;
use crate::sampling::fingerprint::{FarmHashFingerprint, Fingerprinter};
use rayon::prelude::*;
use std::fmt;

/// Non-fatal notice that a group could not meet its target as requested.
#[derive(Debug, Clone, PartialEq)]
pub enum DegenerateGroupWarning {
    /// `N / G` was below one row, so every group targets one row instead.
    PerGroupTarget {
        /// Number of groups the target was spread over
        num_groups: usize,
        /// Requested total sample count
        target_count: usize,
        /// Per-group target before clamping
        computed_per_group: usize,
        /// Per-group target actually used
        clamped_to: usize,
    },
    /// The bucket cutoff of a non-empty group rounded to zero and was raised to one.
    Cutoff {
        /// Key of the group (empty in whole-table mode)
        group: Vec<String>,
        /// Rows in the group
        group_size: usize,
        /// Target for the group
        target: usize,
    },
}

impl fmt::Display for DegenerateGroupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegenerateGroupWarning::PerGroupTarget {
                num_groups,
                target_count,
                computed_per_group,
                clamped_to,
            } => write!(
                f,
                "target of {} samples over {} groups gives {} per group; using {} per group instead",
                target_count, num_groups, computed_per_group, clamped_to
            ),
            DegenerateGroupWarning::Cutoff {
                group,
                group_size,
                target,
            } => write!(
                f,
                "target of {} in group {:?} of {} rows rounds to an empty cutoff; keeping bucket 0",
                target, group, group_size
            ),
        }
    }
}

/// Result of one sampling call.
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    /// Selected rows as a new table
    pub table: Table,
    /// Positions of the selected rows in the input table
    pub selected_rows: Vec<RowIndex>,
    /// Degenerate-group notices raised while sampling
    pub warnings: Vec<DegenerateGroupWarning>,
}

impl SampleOutcome {
    /// Number of selected rows
    pub fn len(&self) -> usize {
        self.selected_rows.len()
    }

    /// Whether nothing was selected
    pub fn is_empty(&self) -> bool {
        self.selected_rows.is_empty()
    }
}

/// Bucket cutoff for a group: `round(target / group_size * bucket_space)`,
/// raised to 1 so that a non-empty group always keeps bucket 0.
/// Returns `None` for an empty group, which is skipped.
pub fn bucket_cutoff(target: usize, group_size: usize, bucket_space: u64) -> Option<Bucket> {
    rounded_cutoff(target, group_size, bucket_space).map(|cutoff| cutoff.max(1))
}

fn rounded_cutoff(target: usize, group_size: usize, bucket_space: u64) -> Option<Bucket> {
    if group_size == 0 {
        return None;
    }
    let fraction = target as f64 / group_size as f64;
    Some((fraction * bucket_space as f64).round() as Bucket)
}

/// Reproducible, size-bounded row sampler.
#[derive(Debug, Clone)]
pub struct DeterministicSampler<H: Fingerprinter = FarmHashFingerprint> {
    config: SamplingConfig,
    hasher: H,
}

impl DeterministicSampler<FarmHashFingerprint> {
    /// Create a sampler using FarmHash `Fingerprint64`.
    pub fn new(config: SamplingConfig) -> Result<Self> {
        Self::with_fingerprinter(config, FarmHashFingerprint)
    }
}

impl<H: Fingerprinter> DeterministicSampler<H> {
    /// Create a sampler with a custom fingerprint function.
    pub fn with_fingerprinter(config: SamplingConfig, hasher: H) -> Result<Self> {
        if config.bucket_space < 2 {
            return Err(AnomalyzeError::invalid_parameter(
                "bucket_space",
                config.bucket_space.to_string(),
                "must be at least 2",
            ));
        }
        Ok(DeterministicSampler { config, hasher })
    }

    /// Sampler configuration
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Bucket of every row of `table`, in row order.
    pub fn buckets(&self, table: &Table) -> Result<Vec<Bucket>> {
        let keys = table.key_strings(&self.config.key_columns(), &self.config.key_separator)?;
        let bucket_space = self.config.bucket_space;
        Ok(keys
            .par_iter()
            .map(|key| self.hasher.bucket(key, bucket_space))
            .collect())
    }

    /// Sample approximately `target_count` rows using the configured mode.
    pub fn sample(&self, table: &Table, target_count: usize) -> Result<SampleOutcome> {
        self.sample_with_mode(table, target_count, self.config.mode)
    }

    /// Sample approximately `target_count` rows using `mode`.
    pub fn sample_with_mode(
        &self,
        table: &Table,
        target_count: usize,
        mode: SamplingMode,
    ) -> Result<SampleOutcome> {
        if target_count < 1 {
            return Err(AnomalyzeError::invalid_parameter(
                "target_count",
                target_count.to_string(),
                "must be at least 1",
            ));
        }
        table.require_columns(&self.config.key_columns())?;

        let buckets = self.buckets(table)?;
        let mut warnings = Vec::new();

        let selected_rows = match mode {
            SamplingMode::Whole => {
                let rows: Vec<RowIndex> = (0..table.num_rows()).collect();
                self.select_group(&[], &rows, &buckets, target_count, &mut warnings)
            }
            SamplingMode::Grouped => {
                let groups = table.group_rows(&[
                    self.config.plate_column.as_str(),
                    self.config.well_column.as_str(),
                ])?;

                let num_groups = groups.len();
                let mut selected = Vec::new();
                if num_groups > 0 {
                    let computed_per_group = target_count / num_groups;
                    let per_group = if computed_per_group < 1 {
                        let warning = DegenerateGroupWarning::PerGroupTarget {
                            num_groups,
                            target_count,
                            computed_per_group,
                            clamped_to: 1,
                        };
                        log::warn!("{}", warning);
                        warnings.push(warning);
                        1
                    } else {
                        computed_per_group
                    };

                    for (key, rows) in &groups {
                        let chosen =
                            self.select_group(key, rows, &buckets, per_group, &mut warnings);
                        log::debug!(
                            "group {:?}: kept {} of {} rows",
                            key,
                            chosen.len(),
                            rows.len()
                        );
                        selected.extend(chosen);
                    }
                }
                selected
            }
        };

        log::info!(
            "Sampled {} of {} rows ({} mode, target {}, {})",
            selected_rows.len(),
            table.num_rows(),
            mode,
            target_count,
            self.hasher.name()
        );

        Ok(SampleOutcome {
            table: table.take(&selected_rows)?,
            selected_rows,
            warnings,
        })
    }

    fn select_group(
        &self,
        group: &[String],
        rows: &[RowIndex],
        buckets: &[Bucket],
        target: usize,
        warnings: &mut Vec<DegenerateGroupWarning>,
    ) -> Vec<RowIndex> {
        let cutoff = match rounded_cutoff(target, rows.len(), self.config.bucket_space) {
            Some(0) => {
                let warning = DegenerateGroupWarning::Cutoff {
                    group: group.to_vec(),
                    group_size: rows.len(),
                    target,
                };
                log::warn!("{}", warning);
                warnings.push(warning);
                1
            }
            Some(cutoff) => cutoff,
            None => return Vec::new(),
        };

        rows.iter()
            .copied()
            .filter(|&row| buckets[row] < cutoff)
            .collect()
    }
}

/// One-shot sampling with explicit key columns and the default fingerprint.
pub fn sample<S: AsRef<str>>(
    dataset: &Table,
    target_count: usize,
    plate_column: &str,
    well_column: &str,
    cell_id_columns: &[S],
    mode: SamplingMode,
) -> Result<SampleOutcome> {
    let config = SamplingConfig {
        plate_column: plate_column.to_string(),
        well_column: well_column.to_string(),
        cell_id_columns: cell_id_columns
            .iter()
            .map(|c| c.as_ref().to_string())
            .collect(),
        mode,
        ..SamplingConfig::default()
    };
    DeterministicSampler::new(config)?.sample(dataset, target_count)
}
