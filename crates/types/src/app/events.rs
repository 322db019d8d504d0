//! The typed event taxonomy of the VEID module.
//!
//! Every event is emitted exactly once per state transition. Events are part
//! of the consensus-visible output: replicas must produce identical event
//! streams for identical blocks.

use super::appeal::AppealResolution;
use super::erasure::ErasureCategory;
use super::identity::AccountId;
use super::model::ModelType;
use super::wallet::Tier;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// All observable state transitions of the module.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub enum IdentityEvent {
    /// A wallet was created.
    WalletCreated {
        /// The owning account.
        account: AccountId,
        /// The derived wallet id.
        wallet_id: [u8; 32],
    },
    /// A scope was uploaded.
    ScopeUploaded {
        /// The owning account.
        account: AccountId,
        /// The new scope.
        scope_id: String,
    },
    /// A scope was revoked.
    ScopeRevoked {
        /// The owning account.
        account: AccountId,
        /// The revoked scope.
        scope_id: String,
        /// The stated reason.
        reason: String,
    },
    /// A scope's verification status changed.
    VerificationStatusChanged {
        /// The scope.
        scope_id: String,
        /// Previous status, as a stable string.
        old_status: String,
        /// New status, as a stable string.
        new_status: String,
    },
    /// An appeal was submitted.
    AppealSubmitted {
        /// The new appeal.
        appeal_id: String,
        /// The submitting account.
        account: AccountId,
        /// The disputed scope.
        scope_id: String,
    },
    /// An appeal was claimed by a reviewer.
    AppealClaimed {
        /// The claimed appeal.
        appeal_id: String,
        /// The claiming reviewer.
        reviewer: AccountId,
    },
    /// An appeal was resolved.
    AppealResolved {
        /// The resolved appeal.
        appeal_id: String,
        /// The outcome.
        resolution: AppealResolution,
        /// The resolving account.
        resolver: AccountId,
    },
    /// An appeal was withdrawn by its submitter.
    AppealWithdrawn {
        /// The withdrawn appeal.
        appeal_id: String,
    },
    /// An approved appeal adjusted a wallet score.
    AppealScoreAdjusted {
        /// The appeal that carried the adjustment.
        appeal_id: String,
        /// The affected account.
        account: AccountId,
        /// Score before the adjustment.
        old_score: u32,
        /// Score after clamping to [0, 100].
        new_score: u32,
    },
    /// A delegation was created.
    DelegationCreated {
        /// The new delegation.
        delegation_id: String,
        /// The granting account.
        delegator: AccountId,
        /// The receiving account.
        delegate: AccountId,
    },
    /// A delegation was used.
    DelegationUsed {
        /// The used delegation.
        delegation_id: String,
        /// The permission exercised.
        permission: String,
        /// Uses remaining after the decrement.
        uses_remaining: u32,
    },
    /// A delegation was revoked.
    DelegationRevoked {
        /// The revoked delegation.
        delegation_id: String,
        /// The stated reason.
        reason: String,
    },
    /// A delegation lapsed in the expiry sweep.
    DelegationExpired {
        /// The expired delegation.
        delegation_id: String,
    },
    /// A model was registered.
    ModelRegistered {
        /// The new model.
        model_id: String,
        /// Its type.
        model_type: ModelType,
        /// Its version string.
        version: String,
    },
    /// A model update proposal was created.
    ModelProposalCreated {
        /// The type being updated.
        model_type: ModelType,
        /// The proposed model.
        model_id: String,
    },
    /// A model update proposal was approved.
    ModelProposalApproved {
        /// The type being updated.
        model_type: ModelType,
        /// The proposed model.
        model_id: String,
        /// The height at which activation applies.
        activation_height: u64,
    },
    /// A model activation was applied.
    ModelActivated {
        /// The type that switched.
        model_type: ModelType,
        /// The newly active model.
        model_id: String,
        /// The model it replaced, if any.
        replaced: Option<String>,
    },
    /// A validator reported a hash diverging from the registry.
    ModelVersionMismatch {
        /// The reporting validator.
        validator: AccountId,
        /// The model in question.
        model_id: String,
    },
    /// A pipeline execution record was accepted.
    PipelineExecutionRecorded {
        /// The request served.
        request_id: String,
        /// The recording validator.
        validator: AccountId,
        /// The output hash.
        output_hash: [u8; 32],
    },
    /// A sync request was issued to a validator.
    ValidatorSyncRequested {
        /// The sync request.
        request_id: String,
        /// The validator asked to sync.
        validator: AccountId,
    },
    /// A validator confirmed a model installation.
    ValidatorSyncConfirmed {
        /// The confirming validator.
        validator: AccountId,
        /// The confirmed model.
        model_id: String,
    },
    /// A validator's sync grace period expired.
    SyncDeadlineExpired {
        /// The validator now in Error status.
        validator: AccountId,
        /// One of the models still out of sync.
        model_id: String,
    },
    /// A model update was broadcast to all validators.
    ModelBroadcast {
        /// The broadcast id.
        broadcast_id: String,
        /// The updated model.
        model_id: String,
        /// Validators moved out of sync by this broadcast.
        out_of_sync_count: u32,
    },
    /// An erasure request was submitted.
    ErasureRequested {
        /// The new request.
        request_id: String,
        /// The requesting account.
        requester: AccountId,
    },
    /// An erasure request entered processing.
    ErasureProcessing {
        /// The request being processed.
        request_id: String,
    },
    /// An erasure request completed (fully or partially).
    ErasureCompleted {
        /// The completed request.
        request_id: String,
        /// Categories erased.
        categories: Vec<ErasureCategory>,
        /// True when on-chain history was made unreadable instead of deleted.
        partial: bool,
    },
    /// An erasure request was rejected.
    ErasureRejected {
        /// The rejected request.
        request_id: String,
        /// The stated reason, e.g. "legal_hold".
        reason: String,
    },
    /// Encryption keys were destroyed as part of an erasure.
    KeyDestruction {
        /// The destruction record.
        record_id: String,
        /// The affected account.
        account: AccountId,
        /// Number of keys destroyed.
        key_count: u32,
    },
    /// A borderline fallback concluded successfully.
    BorderlineFallbackCompleted {
        /// The completed fallback.
        fallback_id: String,
        /// The affected account.
        account: AccountId,
        /// The committed score.
        score: u32,
    },
    /// A borderline fallback failed.
    BorderlineFallbackFailed {
        /// The failed fallback.
        fallback_id: String,
        /// The affected account.
        account: AccountId,
    },
    /// A borderline fallback lapsed in the expiry sweep.
    BorderlineFallbackExpired {
        /// The expired fallback.
        fallback_id: String,
    },
    /// An authorization was granted (fallback passed).
    AuthorizationGranted {
        /// The affected account.
        account: AccountId,
        /// The MFA challenge that granted it.
        challenge_id: String,
    },
    /// An authorization was consumed.
    AuthorizationConsumed {
        /// The affected account.
        account: AccountId,
        /// What was consumed, e.g. a delegation id.
        reference: String,
    },
    /// An authorization lapsed.
    AuthorizationExpired {
        /// The affected account.
        account: AccountId,
        /// The lapsed reference.
        reference: String,
    },
    /// A wallet's tier changed.
    TierChanged {
        /// The affected account.
        account: AccountId,
        /// Tier before the change.
        old_tier: Tier,
        /// Tier after the change.
        new_tier: Tier,
        /// The score that produced the new tier.
        score: u32,
    },
}
