//! Delegations: time-bounded, use-bounded grants of identity-derived
//! permissions from one account to another.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Delegation lifecycle status. Transitions only Active→{Revoked, Expired,
/// Exhausted}.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum DelegationStatus {
    /// Usable.
    Active,
    /// Revoked by the delegator.
    Revoked,
    /// Past its expiry time.
    Expired,
    /// All uses consumed.
    Exhausted,
}

/// A grant of a permission subset from delegator to delegate.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct DelegationRecord {
    /// Deterministic id: H(delegator ∥ delegate ∥ created_at_ns).
    pub delegation_id: String,
    /// The granting account.
    pub delegator: AccountId,
    /// The receiving account. Never equal to the delegator.
    pub delegate: AccountId,
    /// Non-empty set of granted permissions.
    pub permissions: BTreeSet<String>,
    /// Block time of creation.
    pub created_at: u64,
    /// Expiry time; strictly greater than created_at.
    pub expires_at: u64,
    /// Total allowed uses.
    pub max_uses: u32,
    /// Remaining uses. Invariant: uses_remaining ≤ max_uses.
    pub uses_remaining: u32,
    /// Lifecycle status.
    pub status: DelegationStatus,
    /// Why the delegation was revoked, if it was.
    pub revocation_reason: Option<String>,
}
