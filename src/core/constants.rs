//! Constants and configuration defaults.

use crate::core::types::{AbsentPolicy, SamplingMode};

/// Euler–Mascheroni constant used by the expected path length `c(n)`.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Size of the integer bucket space fingerprints are reduced into.
pub const DEFAULT_BUCKET_SPACE: u64 = 10_000;

/// Separator placed between key columns before hashing.
/// Empty keeps keys byte-compatible with previously drawn samples.
pub const DEFAULT_KEY_SEPARATOR: &str = "";

/// Default plate identifier column.
pub const DEFAULT_PLATE_COLUMN: &str = "Metadata_Plate";

/// Default well identifier column.
pub const DEFAULT_WELL_COLUMN: &str = "Metadata_Well";

/// Default extra cell-identity columns.
pub const DEFAULT_CELL_ID_COLUMNS: [&str; 2] = ["Metadata_Site", "Metadata_ObjectNumber"];

/// Name prefix marking metadata (non-feature) columns.
pub const DEFAULT_METADATA_PREFIX: &str = "Metadata";

/// Default sampling strategy.
pub const DEFAULT_SAMPLING_MODE: SamplingMode = SamplingMode::Grouped;

/// Default number of threads for parallel processing.
/// 0 means use all available cores.
pub const DEFAULT_NUM_THREADS: usize = 0;

/// Default handling of features never split on along a sample's paths.
pub const DEFAULT_ABSENT_POLICY: AbsentPolicy = AbsentPolicy::Zero;

/// Offset subtracted from `score_samples` to obtain the decision function
/// (scikit-learn's value for `contamination="auto"`).
pub const DEFAULT_SCORE_OFFSET: f64 = -0.5;

/// Root node id of every tree.
pub const ROOT_NODE: usize = 0;

/// Sentinel used by array-layout trees for "no child".
pub const TREE_LEAF: i64 = -1;

/// Sentinel used by array-layout trees for "no split feature".
pub const TREE_UNDEFINED: i64 = -2;

/// Library version string.
pub const ANOMALYZE_VERSION: &str = env!("CARGO_PKG_VERSION");
