//! Identity scopes: single pieces of verifiable evidence owned by an account.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The closed set of evidence kinds.
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
pub enum ScopeType {
    /// A still self-portrait.
    Selfie,
    /// A short liveness video.
    FaceVideo,
    /// A government-issued identity document.
    IdDocument,
    /// A biometric template (stored only as a memory-hard hash).
    Biometric,
    /// Proof of control over an email address.
    EmailProof,
    /// Proof of control over a DNS domain.
    DomainVerify,
    /// Proof of control over a phone number.
    PhoneProof,
    /// Proof of a physical address.
    AddressProof,
}

impl ScopeType {
    /// Stable single-byte discriminant used inside composite keys.
    pub fn key_byte(&self) -> u8 {
        match self {
            ScopeType::Selfie => 0x01,
            ScopeType::FaceVideo => 0x02,
            ScopeType::IdDocument => 0x03,
            ScopeType::Biometric => 0x04,
            ScopeType::EmailProof => 0x05,
            ScopeType::DomainVerify => 0x06,
            ScopeType::PhoneProof => 0x07,
            ScopeType::AddressProof => 0x08,
        }
    }
}

/// Verification status of a scope.
///
/// Legal transitions: Pending→InProgress, InProgress→{Verified,Rejected},
/// Rejected→Verified (approved appeal only), any non-terminal→Expired.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeStatus {
    /// Uploaded, verification not yet requested.
    Pending,
    /// Verification requested and running.
    InProgress,
    /// Verification succeeded.
    Verified,
    /// Verification failed; appealable within the appeal window.
    Rejected,
    /// Expired before reaching a decision.
    Expired,
}

impl ScopeStatus {
    /// Whether the status admits no further verification transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScopeStatus::Expired)
    }

    /// Statuses swept to Expired once the expiry window passes.
    pub fn is_expirable(&self) -> bool {
        matches!(self, ScopeStatus::Pending | ScopeStatus::InProgress)
    }
}

/// Metadata captured at upload time.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct UploadMetadata {
    /// Client-chosen salt; length-bounded by module parameters.
    pub salt: Vec<u8>,
    /// SHA-256 of the salt. Checked at upload.
    pub salt_hash: [u8; 32],
    /// Opaque device fingerprint string.
    pub device_fingerprint: String,
    /// Signature of the uploading client over the payload hash.
    pub client_signature: Vec<u8>,
    /// Signature of the wallet's binding key over the payload hash.
    pub user_signature: Vec<u8>,
    /// Content hash of the encrypted payload. Must be non-empty.
    pub payload_hash: Vec<u8>,
}

/// A single piece of verifiable evidence.
///
/// The plaintext of `encrypted_payload` is never stored; GDPR erasure makes
/// it permanently unreadable by destroying the envelope key.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct IdentityScope {
    /// Unique scope id.
    pub scope_id: String,
    /// The owning account.
    pub account: AccountId,
    /// Evidence kind.
    pub scope_type: ScopeType,
    /// Opaque encrypted envelope.
    pub encrypted_payload: Vec<u8>,
    /// Upload-time metadata.
    pub upload_metadata: UploadMetadata,
    /// Verification status.
    pub status: ScopeStatus,
    /// Block time of upload.
    pub uploaded_at: u64,
    /// Block height of upload.
    pub uploaded_at_height: u64,
    /// Height at which the scope transitioned to Rejected, if it did. Used to
    /// measure the appeal window exactly.
    pub rejected_at_height: Option<u64>,
    /// Block time of the rejection, for the 30-day hard cutoff.
    pub rejected_at_time: Option<u64>,
    /// Revocation flag. The prior status is preserved for audit.
    pub revoked: bool,
    /// Why the scope was revoked.
    pub revocation_reason: Option<String>,
}

impl IdentityScope {
    /// Whether this scope contributes to the composite score.
    pub fn is_scorable(&self) -> bool {
        self.status == ScopeStatus::Verified && !self.revoked
    }
}
