//! Module parameters, stored as a singleton under [`crate::keys::PARAMS_KEY`]
//! and governable via `UpdateParams`.

use crate::app::{AccountId, ScopeType};
use crate::error::IdentityError;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Upload and quota limits for scopes.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ScopeParams {
    /// Minimum accepted salt length, in bytes.
    pub min_salt_len: u32,
    /// Maximum accepted salt length, in bytes.
    pub max_salt_len: u32,
    /// Maximum scopes of one type per account.
    pub max_scopes_per_type: u32,
    /// Maximum total scopes per account.
    pub max_scopes_per_account: u32,
    /// Whether uploads must carry a client signature.
    pub require_client_signature: bool,
    /// Whether uploads must carry a user (binding-key) signature.
    pub require_user_signature: bool,
    /// Seconds after upload before an undecided scope expires.
    pub expiry_window_secs: u64,
}

/// Appeal system parameters.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct AppealParams {
    /// Master switch. Submissions fail while disabled.
    pub enabled: bool,
    /// Maximum appeals per (account, scope).
    pub max_appeals_per_scope: u32,
    /// Appeal window, in blocks since the scope's rejection height.
    pub appeal_window_blocks: u64,
    /// Hard cutoff in seconds since rejection (30 days).
    pub hard_cutoff_secs: u64,
    /// Blocks a reviewer may hold a claim before it is released.
    pub review_timeout_blocks: u64,
    /// Minimum reason length, in bytes.
    pub min_reason_len: u32,
    /// Maximum reason length, in bytes.
    pub max_reason_len: u32,
    /// Maximum number of evidence hashes per appeal.
    pub max_evidence_hashes: u32,
}

/// Model governance parameters.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ModelParams {
    /// Blocks between proposal approval and activation.
    pub activation_delay_blocks: u64,
}

/// Validator sync protocol parameters.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct SyncParams {
    /// Grace period granted to out-of-sync validators, in blocks.
    pub grace_period_blocks: u64,
    /// Nominal seconds per block, used to convert the grace period to time.
    pub seconds_per_block: u64,
}

impl SyncParams {
    /// The grace period expressed in seconds of block time.
    pub fn grace_period_secs(&self) -> u64 {
        self.grace_period_blocks * self.seconds_per_block
    }
}

/// GDPR erasure parameters.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ErasureParams {
    /// Statutory processing deadline in seconds after submission.
    pub deadline_secs: u64,
}

/// Borderline MFA fallback parameters. Authority-governed via
/// `UpdateBorderlineParams`.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct BorderlineParams {
    /// Master switch for the fallback flow.
    pub enabled: bool,
    /// Half-width of the borderline band around each tier threshold.
    pub band_width: u32,
    /// Minimum MFA factors that must be satisfied to complete a fallback.
    pub min_factors_satisfied: u32,
    /// Seconds before a pending fallback expires.
    pub fallback_expiry_secs: u64,
}

/// The complete governable parameter set of the module.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct VeidParams {
    /// The governance authority; bypasses ownership checks on resolve and
    /// approve operations.
    pub authority: AccountId,
    /// Explicitly whitelisted appeal resolvers, in addition to the authority
    /// and bonded validators.
    pub authorized_resolvers: BTreeSet<AccountId>,
    /// Scope upload limits.
    pub scope: ScopeParams,
    /// Appeal parameters.
    pub appeal: AppealParams,
    /// Model governance parameters.
    pub model: ModelParams,
    /// Validator sync parameters.
    pub sync: SyncParams,
    /// Erasure parameters.
    pub erasure: ErasureParams,
    /// Borderline fallback parameters.
    pub borderline: BorderlineParams,
    /// Static score weight per scope type.
    pub score_weights: BTreeMap<ScopeType, u32>,
}

impl Default for VeidParams {
    fn default() -> Self {
        let mut score_weights = BTreeMap::new();
        score_weights.insert(ScopeType::Selfie, 15);
        score_weights.insert(ScopeType::FaceVideo, 20);
        score_weights.insert(ScopeType::IdDocument, 25);
        score_weights.insert(ScopeType::Biometric, 20);
        score_weights.insert(ScopeType::EmailProof, 10);
        score_weights.insert(ScopeType::DomainVerify, 10);
        score_weights.insert(ScopeType::PhoneProof, 10);
        score_weights.insert(ScopeType::AddressProof, 10);
        Self {
            authority: AccountId::default(),
            authorized_resolvers: BTreeSet::new(),
            scope: ScopeParams {
                min_salt_len: 16,
                max_salt_len: 64,
                max_scopes_per_type: 3,
                max_scopes_per_account: 16,
                require_client_signature: false,
                require_user_signature: true,
                expiry_window_secs: 14 * 24 * 3600,
            },
            appeal: AppealParams {
                enabled: true,
                max_appeals_per_scope: 3,
                appeal_window_blocks: 100_800, // ~7 days at 6s blocks
                hard_cutoff_secs: 30 * 24 * 3600,
                review_timeout_blocks: 14_400, // ~1 day
                min_reason_len: 100,
                max_reason_len: 4096,
                max_evidence_hashes: 16,
            },
            model: ModelParams {
                activation_delay_blocks: 100,
            },
            sync: SyncParams {
                grace_period_blocks: 600,
                seconds_per_block: 6,
            },
            erasure: ErasureParams {
                deadline_secs: 30 * 24 * 3600,
            },
            borderline: BorderlineParams {
                enabled: true,
                band_width: 3,
                min_factors_satisfied: 2,
                fallback_expiry_secs: 24 * 3600,
            },
            score_weights,
        }
    }
}

impl VeidParams {
    /// Validates internal consistency. Called before any parameter update is
    /// persisted.
    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.scope.min_salt_len > self.scope.max_salt_len {
            return Err(IdentityError::InvalidParameter(
                "min_salt_len exceeds max_salt_len".into(),
            ));
        }
        if self.scope.max_scopes_per_account == 0 || self.scope.max_scopes_per_type == 0 {
            return Err(IdentityError::InvalidParameter(
                "scope quotas must be positive".into(),
            ));
        }
        if self.appeal.min_reason_len > self.appeal.max_reason_len {
            return Err(IdentityError::InvalidParameter(
                "min_reason_len exceeds max_reason_len".into(),
            ));
        }
        if self.sync.seconds_per_block == 0 {
            return Err(IdentityError::InvalidParameter(
                "seconds_per_block must be positive".into(),
            ));
        }
        if self.borderline.band_width > 50 {
            return Err(IdentityError::InvalidParameter(
                "borderline band_width exceeds half the score range".into(),
            ));
        }
        Ok(())
    }
}
