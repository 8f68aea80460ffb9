//! Stable 64-bit fingerprints of sampling keys.
//!
//! Sampling decisions are only reproducible while the fingerprint function
//! stays the same. Swapping the implementation silently changes every
//! previously drawn sample and must be treated as a compatibility break.

use crate::core::types::Bucket;

/// A fixed, non-cryptographic 64-bit hash of a byte string.
pub trait Fingerprinter: Send + Sync {
    /// Fingerprint of `bytes`
    fn fingerprint(&self, bytes: &[u8]) -> u64;

    /// Short identifier recorded in logs next to sampling results
    fn name(&self) -> &'static str;

    /// Fingerprint reduced into `[0, bucket_space)`
    fn bucket(&self, key: &str, bucket_space: u64) -> Bucket {
        self.fingerprint(key.as_bytes()) % bucket_space
    }
}

/// FarmHash `Fingerprint64`. The value is fixed by the FarmHash reference
/// and does not change between platforms or releases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FarmHashFingerprint;

impl Fingerprinter for FarmHashFingerprint {
    fn fingerprint(&self, bytes: &[u8]) -> u64 {
        farmhash::fingerprint64(bytes)
    }

    fn name(&self) -> &'static str {
        "farmhash-fingerprint64"
    }
}
