//! Validator model-sync protocol state: per-validator install records, sync
//! requests, confirmations and update broadcasts.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-validator synchronization status.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncStatus {
    /// All installed models match the registry.
    Synced,
    /// A sync request is in flight.
    Syncing,
    /// At least one installed model diverges from the registry.
    OutOfSync,
    /// The grace period expired before the validator confirmed.
    Error,
}

/// One installed model version as reported by a validator.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModelVersionInfo {
    /// The installed model id.
    pub model_id: String,
    /// Its version string.
    pub version: String,
    /// SHA-256 the validator reports for the artifact.
    pub sha256_hash: [u8; 32],
    /// Block time of the confirming message.
    pub installed_at: u64,
}

/// The per-validator sync record.
///
/// Invariant: `sync_status == Synced` iff `out_of_sync_models` is empty.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ValidatorModelSync {
    /// The validator this record tracks.
    pub validator: AccountId,
    /// Installed model versions, keyed by model id.
    pub model_versions: BTreeMap<String, ModelVersionInfo>,
    /// Aggregate status.
    pub sync_status: SyncStatus,
    /// Model ids whose installed hash diverges from the registry.
    pub out_of_sync_models: Vec<String>,
    /// Block time the validator first went out of sync. Cleared on resync.
    pub first_out_of_sync_at: Option<u64>,
    /// Deadline after which the validator transitions to Error.
    pub grace_period_expires: Option<u64>,
    /// Number of sync requests issued since the last Synced state.
    pub sync_attempts: u32,
    /// Last recorded error, if any.
    pub last_error: Option<String>,
}

impl ValidatorModelSync {
    /// A fresh, fully-synced record for a validator.
    pub fn new(validator: AccountId) -> Self {
        Self {
            validator,
            model_versions: BTreeMap::new(),
            sync_status: SyncStatus::Synced,
            out_of_sync_models: Vec::new(),
            first_out_of_sync_at: None,
            grace_period_expires: None,
            sync_attempts: 0,
            last_error: None,
        }
    }
}

/// Sync request lifecycle status.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncRequestStatus {
    /// Issued; no named model confirmed yet.
    Pending,
    /// Some but not all named models confirmed.
    Partial,
    /// Every named model confirmed.
    Complete,
    /// Expired before completion.
    Expired,
}

/// A request for a validator to install the named models.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct SyncRequest {
    /// Unique request id.
    pub request_id: String,
    /// The validator asked to sync.
    pub validator: AccountId,
    /// The models to install. Never empty; defaults to all active models.
    pub model_ids: Vec<String>,
    /// Model ids not yet confirmed.
    pub outstanding: Vec<String>,
    /// Lifecycle status.
    pub status: SyncRequestStatus,
    /// Block time of issuance.
    pub created_at: u64,
    /// Expiry time: created_at + grace period.
    pub expires_at: u64,
}

/// A validator's confirmation that one model is installed with the canonical
/// hash.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct SyncConfirmation {
    /// Unique confirmation id.
    pub confirmation_id: String,
    /// The confirming validator.
    pub validator: AccountId,
    /// The confirmed model.
    pub model_id: String,
    /// The hash the validator installed; equals the registry hash.
    pub sha256_hash: [u8; 32],
    /// Height of the confirming message.
    pub confirmed_at_height: u64,
    /// Block time of the confirming message.
    pub confirmed_at_time: u64,
}

/// A governance broadcast announcing a model update to all validators.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModelBroadcast {
    /// Unique broadcast id.
    pub broadcast_id: String,
    /// The updated model.
    pub model_id: String,
    /// The model's version string after the update.
    pub new_version: String,
    /// The canonical hash after the update.
    pub new_hash: [u8; 32],
    /// Block time of the broadcast.
    pub broadcast_at: u64,
    /// Deadline by which every validator must confirm.
    pub sync_deadline: u64,
}
