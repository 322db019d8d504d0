//! Biometric template hashes.
//!
//! The raw template is never persisted; only a memory-hard KDF digest and a
//! set of locality-sensitive hash buckets survive, so similar templates can
//! be flagged in logs without the originals ever touching state.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Number of LSH buckets kept per template.
pub const LSH_BUCKETS: usize = 16;
/// Width of each LSH bucket in bytes.
pub const LSH_BUCKET_BYTES: usize = 8;

/// The persisted digest of a biometric template.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct BiometricTemplateHash {
    /// Unique hash id.
    pub hash_id: String,
    /// The owning account.
    pub account: AccountId,
    /// Template kind, e.g. "face", "fingerprint".
    pub template_type: String,
    /// Memory-hard KDF digest of (template ∥ salt).
    pub hash_value: Vec<u8>,
    /// 32-byte salt, unique per hash.
    pub salt: [u8; 32],
    /// Hashing scheme version.
    pub version: u32,
    /// Match threshold in percent, carried for the caller's policy.
    pub match_threshold: u32,
    /// 16 buckets × 8 bytes of locality-sensitive hashes.
    pub lsh_hashes: [[u8; LSH_BUCKET_BYTES]; LSH_BUCKETS],
}

impl BiometricTemplateHash {
    /// Fraction of matching LSH buckets between two hashes, in percent.
    ///
    /// Informational only: no match decision in this module consults it.
    pub fn lsh_similarity(&self, other: &BiometricTemplateHash) -> u32 {
        let matching = self
            .lsh_hashes
            .iter()
            .zip(other.lsh_hashes.iter())
            .filter(|(a, b)| a == b)
            .count() as u32;
        matching * 100 / LSH_BUCKETS as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with_buckets(first: u8) -> BiometricTemplateHash {
        let mut lsh = [[0u8; LSH_BUCKET_BYTES]; LSH_BUCKETS];
        lsh[0] = [first; LSH_BUCKET_BYTES];
        BiometricTemplateHash {
            hash_id: "h1".into(),
            account: AccountId([1; 32]),
            template_type: "face".into(),
            hash_value: vec![0xAB; 32],
            salt: [2; 32],
            version: 1,
            match_threshold: 80,
            lsh_hashes: lsh,
        }
    }

    #[test]
    fn identical_buckets_are_fully_similar() {
        let a = hash_with_buckets(1);
        assert_eq!(a.lsh_similarity(&a), 100);
    }

    #[test]
    fn one_divergent_bucket_reduces_similarity() {
        let a = hash_with_buckets(1);
        let b = hash_with_buckets(2);
        assert_eq!(a.lsh_similarity(&b), (15 * 100 / 16) as u32);
    }
}
