//! Core data types shared across the sampler and the attributor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature index type (global column position in a feature matrix).
pub type FeatureIndex = usize;

/// Tree node identifier type (position in a tree's node arena).
pub type NodeIndex = usize;

/// Row position inside a table or feature matrix.
pub type RowIndex = usize;

/// Bucket value obtained by reducing a 64-bit fingerprint into the bucket space.
pub type Bucket = u64;

/// Sampling strategy for [`crate::sampling::DeterministicSampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Approximately `N` rows drawn uniformly over the whole table ("plate sampling")
    Whole,
    /// Approximately `N / G` rows per (plate, well) group ("well sampling")
    Grouped,
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::Grouped
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingMode::Whole => write!(f, "whole"),
            SamplingMode::Grouped => write!(f, "grouped"),
        }
    }
}

impl std::str::FromStr for SamplingMode {
    type Err = crate::core::error::AnomalyzeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "whole" | "plate" | "plate_sampling" => Ok(SamplingMode::Whole),
            "grouped" | "well" | "well_sampling" => Ok(SamplingMode::Grouped),
            other => Err(crate::core::error::AnomalyzeError::invalid_parameter(
                "sampling_mode",
                other,
                "expected one of: whole, grouped",
            )),
        }
    }
}

/// How a (sample, feature) cell is reported when no tree path split on the feature.
///
/// The default is [`AbsentPolicy::Zero`]: a feature that never isolated a
/// sample gets 0.0, so every cell of an importance table is a number and row
/// sums equal `c(max_samples)` minus the mean path length. Choose
/// [`AbsentPolicy::Absent`] to mark such cells as missing (NaN) instead;
/// [`filter`](crate::IsolationPathAttributor::filter) then drops them, which
/// matches reporting only features that appeared on some path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentPolicy {
    /// Report 0.0 (no isolation credit)
    Zero,
    /// Report NaN so that `filter` drops the cell
    Absent,
}

impl Default for AbsentPolicy {
    fn default() -> Self {
        AbsentPolicy::Zero
    }
}

impl fmt::Display for AbsentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbsentPolicy::Zero => write!(f, "zero"),
            AbsentPolicy::Absent => write!(f, "absent"),
        }
    }
}

/// Inlier / outlier label, using the scikit-learn convention of +1 / -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    /// Regular observation
    Inlier,
    /// Anomalous observation
    Outlier,
}

impl Prediction {
    /// Numeric label (+1 inlier, -1 outlier)
    pub fn as_label(&self) -> i8 {
        match self {
            Prediction::Inlier => 1,
            Prediction::Outlier => -1,
        }
    }
}
