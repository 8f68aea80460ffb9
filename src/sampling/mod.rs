//! Deterministic sampling of single-cell tables.
//!
//! Rows are selected by a stable fingerprint of their identifying key rather
//! than by a random draw, so the same rows are selected on every run.

pub mod deterministic;
pub mod fingerprint;

pub use deterministic::{
    bucket_cutoff, sample, DegenerateGroupWarning, DeterministicSampler, SampleOutcome,
};
pub use fingerprint::{FarmHashFingerprint, Fingerprinter};
