//! Borderline MFA fallback records.
//!
//! When a verification lands in the borderline band around a tier threshold,
//! the decision is deferred to an external MFA challenge; the module only
//! tracks the challenge handle and its outcome.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Status reported by the external MFA oracle for a challenge.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChallengeStatus {
    /// The challenge has not concluded.
    Pending,
    /// The user passed the challenge.
    Verified,
    /// The user failed the challenge.
    Failed,
    /// The challenge lapsed.
    Expired,
}

/// Fallback record lifecycle status.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FallbackStatus {
    /// Awaiting the MFA outcome.
    Pending,
    /// MFA passed; the borderline score was committed.
    Completed,
    /// MFA failed.
    Failed,
    /// Expired before an outcome arrived.
    Expired,
    /// Cancelled administratively.
    Cancelled,
}

/// A deferred borderline verification decision.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct BorderlineFallbackRecord {
    /// Unique fallback id.
    pub fallback_id: String,
    /// The account whose score is in the borderline band.
    pub account: AccountId,
    /// Opaque handle of the external MFA challenge.
    pub challenge_id: String,
    /// The score awaiting confirmation.
    pub borderline_score: u32,
    /// Lifecycle status.
    pub status: FallbackStatus,
    /// MFA factors reported satisfied on completion.
    pub factors_satisfied: Vec<String>,
    /// Block time of creation.
    pub created_at: u64,
    /// Expiry time for the pending record.
    pub expires_at: u64,
}
