//! The identity wallet: the per-account container binding a public key to a
//! set of scope references, a composite score and a tier.

use super::identity::AccountId;
use super::scope::ScopeType;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a wallet.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum WalletStatus {
    /// The wallet is usable.
    Active,
    /// The wallet is administratively suspended; no scope operations allowed.
    Suspended,
    /// The wallet is closed and retained for audit only.
    Closed,
}

/// Verification state of the composite score.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScoreStatus {
    /// No scoring has happened yet.
    Unknown,
    /// A scoring decision is in flight (e.g. awaiting a borderline fallback).
    Pending,
    /// The score was produced by a verified pipeline execution.
    Verified,
    /// Verification concluded negatively.
    Rejected,
}

/// The four trust tiers derived from the composite score.
#[derive(
    Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug,
)]
pub enum Tier {
    /// Score below 50, unverified status, or a locked wallet.
    Unverified,
    /// Score 50–69.
    Basic,
    /// Score 70–84.
    Standard,
    /// Score 85–100.
    Premium,
}

impl Tier {
    /// The tier function. Pure; every replica must agree on its output.
    pub fn for_score(score: u32, status: ScoreStatus, locked: bool) -> Tier {
        if locked || status != ScoreStatus::Verified || score < 50 {
            Tier::Unverified
        } else if score < 70 {
            Tier::Basic
        } else if score < 85 {
            Tier::Standard
        } else {
            Tier::Premium
        }
    }
}

/// A wallet's reference to a separately-addressable scope.
///
/// Wallets exclusively own their reference list; a scope may be referenced by
/// at most one wallet.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ScopeReference {
    /// The referenced scope id.
    pub scope_id: String,
    /// The scope's type, denormalized for score computation.
    pub scope_type: ScopeType,
    /// Block time at which the reference was added.
    pub added_at: u64,
}

/// Per-wallet consent flags, mutated only through `UpdateConsentSettings`.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct ConsentSettings {
    /// Consent to processing of uploaded evidence.
    pub data_processing: bool,
    /// Consent to ML feature extraction over uploaded evidence.
    pub ml_feature_extraction: bool,
    /// Consent to sharing derived features across validators.
    pub cross_validator_sharing: bool,
    /// Block time of the last update.
    pub updated_at: u64,
}

/// One entry in a wallet's verification history.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct VerificationEntry {
    /// The score recorded by this entry.
    pub score: u32,
    /// The score status recorded by this entry.
    pub status: ScoreStatus,
    /// Why the score changed, e.g. "appeal_adjustment".
    pub reason: String,
    /// Block height of the change.
    pub height: u64,
    /// Block time of the change.
    pub time: u64,
}

/// The per-account identity wallet.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Wallet {
    /// Deterministic hash of the account address.
    pub wallet_id: [u8; 32],
    /// The owning account.
    pub account_address: AccountId,
    /// The Ed25519 key bound to this wallet.
    pub binding_public_key: Vec<u8>,
    /// Signature by the binding key over the canonical binding message.
    pub binding_signature: Vec<u8>,
    /// Lifecycle status.
    pub status: WalletStatus,
    /// Composite trust score, 0–100.
    pub current_score: u32,
    /// Verification state of the score.
    pub score_status: ScoreStatus,
    /// Tier derived from (score, score_status, locked).
    pub tier: Tier,
    /// Ordered list of referenced scopes.
    pub scope_refs: Vec<ScopeReference>,
    /// Consent flags.
    pub consent_settings: ConsentSettings,
    /// Content-addressed hashes of ML-derived features.
    pub derived_features: Vec<[u8; 32]>,
    /// Append-only history of score changes.
    pub verification_history: Vec<VerificationEntry>,
    /// Administrative lock; forces tier Unverified while set.
    pub locked: bool,
    /// Block height at which the wallet was created.
    pub created_at_height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        let v = ScoreStatus::Verified;
        assert_eq!(Tier::for_score(49, v, false), Tier::Unverified);
        assert_eq!(Tier::for_score(50, v, false), Tier::Basic);
        assert_eq!(Tier::for_score(69, v, false), Tier::Basic);
        assert_eq!(Tier::for_score(70, v, false), Tier::Standard);
        assert_eq!(Tier::for_score(84, v, false), Tier::Standard);
        assert_eq!(Tier::for_score(85, v, false), Tier::Premium);
        assert_eq!(Tier::for_score(100, v, false), Tier::Premium);
    }

    #[test]
    fn unverified_status_or_lock_forces_unverified_tier() {
        assert_eq!(
            Tier::for_score(90, ScoreStatus::Pending, false),
            Tier::Unverified
        );
        assert_eq!(
            Tier::for_score(90, ScoreStatus::Verified, true),
            Tier::Unverified
        );
    }
}
