//! GDPR erasure requests and cryptographic key-destruction records.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The closed set of erasable data categories.
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Hash,
)]
pub enum ErasureCategory {
    /// Biometric template hashes.
    BiometricTemplates,
    /// ML-derived feature hashes held in the wallet.
    DerivedFeatures,
    /// Consent settings.
    ConsentRecords,
    /// Encrypted scope payloads (made unreadable, envelope retained).
    ScopePayloads,
    /// Expands to every other category.
    All,
}

impl ErasureCategory {
    /// Every concrete category, in canonical order. `All` expands to this.
    pub fn concrete() -> [ErasureCategory; 4] {
        [
            ErasureCategory::BiometricTemplates,
            ErasureCategory::DerivedFeatures,
            ErasureCategory::ConsentRecords,
            ErasureCategory::ScopePayloads,
        ]
    }
}

/// Erasure request lifecycle status.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErasureStatus {
    /// Submitted, not yet processed.
    Pending,
    /// Being executed.
    Processing,
    /// Every requested category purged, nothing retained.
    Completed,
    /// Executed, but immutable history remains (made unreadable instead).
    PartiallyCompleted,
    /// Refused, e.g. under a legal hold.
    Rejected,
    /// Execution failed.
    Failed,
}

/// Which categories were actually purged and how.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct ErasureReport {
    /// Categories successfully erased.
    pub categories_erased: Vec<ErasureCategory>,
    /// Number of individual records destroyed.
    pub records_destroyed: u32,
    /// True when on-chain history could not be deleted and was made
    /// cryptographically unreadable instead. Forces PartiallyCompleted.
    pub on_chain_data_made_unreadable: bool,
}

/// A GDPR Article 17 erasure request.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ErasureRequest {
    /// Unique request id.
    pub request_id: String,
    /// The requesting account.
    pub requester: AccountId,
    /// Requested categories, deduplicated.
    pub categories: Vec<ErasureCategory>,
    /// Lifecycle status.
    pub status: ErasureStatus,
    /// Block time of submission.
    pub submitted_at: u64,
    /// Height of submission.
    pub submitted_at_height: u64,
    /// Statutory deadline: submitted_at + 30 days.
    pub deadline_at: u64,
    /// Block time of processing, if processed.
    pub processed_at: Option<u64>,
    /// Why the request was rejected, if it was.
    pub rejection_reason: Option<String>,
    /// The execution report, once processed.
    pub erasure_report: Option<ErasureReport>,
    /// H(requester ∥ request id ∥ submitted_at); lets the requester verify
    /// the certificate refers to their request.
    pub verification_hash: [u8; 32],
}

/// Proof of cryptographic erasure: the fingerprints of destroyed keys.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct KeyDestructionRecord {
    /// Unique record id.
    pub record_id: String,
    /// The account whose keys were destroyed.
    pub account: AccountId,
    /// The erasure request this record belongs to.
    pub request_id: String,
    /// Categories covered by this destruction.
    pub categories: Vec<ErasureCategory>,
    /// SHA-256 fingerprints of the destroyed key material.
    pub key_fingerprints: Vec<[u8; 32]>,
    /// Block time of destruction.
    pub destroyed_at: u64,
    /// Height of destruction.
    pub destroyed_at_height: u64,
}

/// A summary certificate for a processed erasure request.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ErasureCertificate {
    /// The certified request.
    pub request_id: String,
    /// The requesting account.
    pub requester: AccountId,
    /// Final request status.
    pub status: ErasureStatus,
    /// Categories actually erased.
    pub categories_erased: Vec<ErasureCategory>,
    /// Fingerprints of all destroyed keys, across destruction records.
    pub key_fingerprints: Vec<[u8; 32]>,
    /// The request's verification hash.
    pub verification_hash: [u8; 32],
    /// Height at which the certificate was issued.
    pub issued_at_height: u64,
}
