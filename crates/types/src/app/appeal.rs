//! Appeal records: user-initiated disputes of rejected verifications.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Appeal lifecycle status.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppealStatus {
    /// Submitted, waiting for a reviewer to claim it.
    Pending,
    /// Claimed by a reviewer.
    Reviewing,
    /// Resolved in the submitter's favor.
    Approved,
    /// Resolved against the submitter.
    Rejected,
    /// Withdrawn by the submitter.
    Withdrawn,
    /// Timed out before resolution.
    Expired,
}

impl AppealStatus {
    /// Active appeals block a second submission for the same scope.
    pub fn is_active(&self) -> bool {
        matches!(self, AppealStatus::Pending | AppealStatus::Reviewing)
    }

    /// Terminal appeals admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// The outcome a resolver can hand down.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppealResolution {
    /// Uphold the appeal.
    Approved,
    /// Deny the appeal.
    Rejected,
}

/// A single appeal of a rejected scope verification.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct AppealRecord {
    /// Deterministic id: H(submitter ∥ scope_id ∥ submission height).
    pub appeal_id: String,
    /// The submitting account.
    pub account: AccountId,
    /// The disputed scope.
    pub scope_id: String,
    /// The wallet score at submission time.
    pub original_score: u32,
    /// Length-bounded free-text justification.
    pub reason: String,
    /// Content hashes of supporting evidence.
    pub evidence_hashes: Vec<[u8; 32]>,
    /// Block height of submission.
    pub submitted_at_height: u64,
    /// Block time of submission; orders the pending queue.
    pub submitted_at_time: u64,
    /// Monotonic counter per (account, scope).
    pub appeal_number: u32,
    /// Lifecycle status.
    pub status: AppealStatus,
    /// The reviewer who claimed the appeal.
    pub reviewer: Option<AccountId>,
    /// Height at which the appeal was claimed; drives the review timeout.
    pub claimed_at_height: Option<u64>,
    /// Height of resolution.
    pub resolved_at_height: Option<u64>,
    /// Free-text resolution notes.
    pub resolution_notes: Option<String>,
    /// Signed score adjustment applied on approval. Applied exactly once.
    pub score_adjustment: i32,
}
