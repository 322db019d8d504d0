//! The validator model-sync protocol.
//!
//! Every replica must run inference with the same model binaries; divergence
//! would produce non-deterministic scores. Broadcasts mark validators out of
//! sync, sync requests track installation progress, confirmations prove an
//! install against the registry hash, and the end-of-block deadline check
//! moves laggards to Error. Confirmations are messages and therefore apply
//! before the deadline check of the same block, so a validator confirming at
//! the deadline block never flips to Error.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    domain_hash, AccountId, IdentityEvent, ModelBroadcast, ModelVersionInfo, SyncConfirmation,
    SyncRequest, SyncRequestStatus, SyncStatus, ValidatorModelSync,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `BroadcastModelUpdate`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct BroadcastModelUpdateParams {
    /// The updated model.
    pub model_id: String,
    /// Its version string after the update.
    pub new_version: String,
    /// Its canonical hash after the update.
    pub new_hash: [u8; 32],
}

/// Response to `BroadcastModelUpdate`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct BroadcastModelUpdateResponse {
    /// The new broadcast id.
    pub broadcast_id: String,
    /// How many validators the broadcast moved out of sync.
    pub out_of_sync_count: u32,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `RequestModelSync`. An empty model list means every
/// currently active model.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RequestModelSyncParams {
    /// The models to install; empty substitutes the active set.
    pub model_ids: Vec<String>,
}

/// Response to `RequestModelSync`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RequestModelSyncResponse {
    /// The new sync request id.
    pub request_id: String,
    /// The models the request covers, after substitution.
    pub model_ids: Vec<String>,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `ConfirmModelSync`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ConfirmModelSyncParams {
    /// The confirmed model.
    pub model_id: String,
    /// The hash the validator installed.
    pub sha256_hash: [u8; 32],
}

/// Response to `ConfirmModelSync`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ConfirmModelSyncResponse {
    /// Whether the validator is fully synced after this confirmation.
    pub synced: bool,
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    pub(crate) fn validator_sync_key(validator: &AccountId) -> Vec<u8> {
        keys::key1(keys::VALIDATOR_SYNC_PREFIX, validator.as_ref())
    }

    pub(crate) fn load_validator_sync(
        &self,
        state: &dyn StateAccess,
        validator: &AccountId,
    ) -> Result<ValidatorModelSync, IdentityError> {
        Ok(store::get_typed(state, &Self::validator_sync_key(validator))?
            .unwrap_or_else(|| ValidatorModelSync::new(*validator)))
    }

    pub(crate) fn save_validator_sync(
        &self,
        state: &mut dyn StateAccess,
        record: &ValidatorModelSync,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::validator_sync_key(&record.validator), record)
    }

    /// Handles `BroadcastModelUpdate` (authority only).
    ///
    /// Walks every validator sync record; any validator whose installed hash
    /// for the model differs is appended to its out-of-sync list and, if it
    /// was Synced, moved to OutOfSync with the broadcast's deadline.
    pub fn broadcast_model_update(
        &self,
        state: &mut dyn StateAccess,
        params: BroadcastModelUpdateParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<BroadcastModelUpdateResponse, IdentityError> {
        let module_params = store::load_params(state)?;
        if ctx.signer_account_id != module_params.authority {
            return Err(IdentityError::Unauthorized(
                "model broadcasts require the authority".into(),
            ));
        }
        // The broadcast must refer to a registered model.
        self.load_model(state, &params.model_id)?;

        let broadcast_id = hex::encode(domain_hash(
            b"VEID-BROADCAST-ID::V1",
            &[
                params.model_id.as_bytes(),
                &ctx.block_height.to_be_bytes(),
            ],
        ));
        let sync_deadline = ctx.block_time + module_params.sync.grace_period_secs();
        let broadcast = ModelBroadcast {
            broadcast_id: broadcast_id.clone(),
            model_id: params.model_id.clone(),
            new_version: params.new_version,
            new_hash: params.new_hash,
            broadcast_at: ctx.block_time,
            sync_deadline,
        };
        store::put_typed(
            state,
            &keys::key1(keys::MODEL_BROADCAST_PREFIX, broadcast_id.as_bytes()),
            &broadcast,
        )?;
        store::put_index(
            state,
            &keys::key2(
                keys::MODEL_BROADCAST_BY_MODEL_PREFIX,
                params.model_id.as_bytes(),
                broadcast_id.as_bytes(),
            ),
        )?;

        let mut out_of_sync_count = 0u32;
        let snapshot = store::collect_prefix(state, &[keys::VALIDATOR_SYNC_PREFIX])?;
        for (_key, value) in snapshot {
            let mut record: ValidatorModelSync =
                veid_types::codec::from_bytes_canonical(&value)
                    .map_err(veid_types::error::StateError::Decode)?;
            let installed_matches = record
                .model_versions
                .get(&params.model_id)
                .map(|info| info.sha256_hash == params.new_hash)
                .unwrap_or(false);
            if installed_matches {
                continue;
            }
            if !record.out_of_sync_models.contains(&params.model_id) {
                record.out_of_sync_models.push(params.model_id.clone());
            }
            if record.sync_status == SyncStatus::Synced {
                record.sync_status = SyncStatus::OutOfSync;
                if record.first_out_of_sync_at.is_none() {
                    record.first_out_of_sync_at = Some(ctx.block_time);
                }
                if record.grace_period_expires.is_none() {
                    record.grace_period_expires = Some(sync_deadline);
                }
            }
            out_of_sync_count += 1;
            sink.emit(IdentityEvent::ModelVersionMismatch {
                validator: record.validator,
                model_id: params.model_id.clone(),
            });
            self.save_validator_sync(state, &record)?;
        }

        sink.emit(IdentityEvent::ModelBroadcast {
            broadcast_id: broadcast_id.clone(),
            model_id: params.model_id,
            out_of_sync_count,
        });
        Ok(BroadcastModelUpdateResponse {
            broadcast_id,
            out_of_sync_count,
            height: ctx.block_height,
        })
    }

    /// Handles `RequestModelSync` by a bonded validator.
    pub fn request_model_sync(
        &self,
        state: &mut dyn StateAccess,
        params: RequestModelSyncParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<RequestModelSyncResponse, IdentityError> {
        let validator = ctx.signer_account_id;
        if !store::is_bonded_validator(state, &validator)? {
            return Err(IdentityError::Unauthorized(
                "sync requests require a bonded validator".into(),
            ));
        }
        let module_params = store::load_params(state)?;

        let model_ids = if params.model_ids.is_empty() {
            self.model_version_state(state)?
                .active
                .values()
                .cloned()
                .collect::<Vec<_>>()
        } else {
            params.model_ids
        };
        if model_ids.is_empty() {
            return Err(IdentityError::Precondition(
                "no active models to sync".into(),
            ));
        }

        let request_id = hex::encode(domain_hash(
            b"VEID-SYNC-REQUEST-ID::V1",
            &[validator.as_ref(), &ctx.block_height.to_be_bytes()],
        ));
        let request = SyncRequest {
            request_id: request_id.clone(),
            validator,
            model_ids: model_ids.clone(),
            outstanding: model_ids.clone(),
            status: SyncRequestStatus::Pending,
            created_at: ctx.block_time,
            expires_at: ctx.block_time + module_params.sync.grace_period_secs(),
        };
        store::put_typed(
            state,
            &keys::key1(keys::SYNC_REQUEST_PREFIX, request_id.as_bytes()),
            &request,
        )?;
        store::put_index(
            state,
            &keys::key2(
                keys::SYNC_REQUEST_BY_VALIDATOR_PREFIX,
                validator.as_ref(),
                request_id.as_bytes(),
            ),
        )?;

        let mut record = self.load_validator_sync(state, &validator)?;
        record.sync_attempts += 1;
        record.sync_status = SyncStatus::Syncing;
        self.save_validator_sync(state, &record)?;

        sink.emit(IdentityEvent::ValidatorSyncRequested {
            request_id: request_id.clone(),
            validator,
        });
        Ok(RequestModelSyncResponse {
            request_id,
            model_ids,
            height: ctx.block_height,
        })
    }

    /// Handles `ConfirmModelSync` by a bonded validator.
    ///
    /// Idempotent when the hash matches the registry and the model is
    /// already installed: re-confirmation rewrites the same installed state.
    pub fn confirm_model_sync(
        &self,
        state: &mut dyn StateAccess,
        params: ConfirmModelSyncParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ConfirmModelSyncResponse, IdentityError> {
        let validator = ctx.signer_account_id;
        if !store::is_bonded_validator(state, &validator)? {
            return Err(IdentityError::Unauthorized(
                "sync confirmations require a bonded validator".into(),
            ));
        }

        let model = self.load_model(state, &params.model_id)?;
        if model.sha256_hash != params.sha256_hash {
            return Err(IdentityError::HashMismatch {
                expected: hex::encode(model.sha256_hash),
                got: hex::encode(params.sha256_hash),
            });
        }

        let confirmation_id = hex::encode(domain_hash(
            b"VEID-SYNC-CONFIRM-ID::V1",
            &[
                validator.as_ref(),
                params.model_id.as_bytes(),
                &ctx.block_height.to_be_bytes(),
            ],
        ));
        store::put_typed(
            state,
            &keys::key1(keys::SYNC_CONFIRMATION_PREFIX, confirmation_id.as_bytes()),
            &SyncConfirmation {
                confirmation_id: confirmation_id.clone(),
                validator,
                model_id: params.model_id.clone(),
                sha256_hash: params.sha256_hash,
                confirmed_at_height: ctx.block_height,
                confirmed_at_time: ctx.block_time,
            },
        )?;
        store::put_index(
            state,
            &keys::key2(
                keys::SYNC_CONFIRMATION_BY_VALIDATOR_PREFIX,
                validator.as_ref(),
                confirmation_id.as_bytes(),
            ),
        )?;

        let mut record = self.load_validator_sync(state, &validator)?;
        record.model_versions.insert(
            params.model_id.clone(),
            ModelVersionInfo {
                model_id: params.model_id.clone(),
                version: model.version.clone(),
                sha256_hash: params.sha256_hash,
                installed_at: ctx.block_time,
            },
        );
        record.out_of_sync_models.retain(|m| m != &params.model_id);
        let synced = record.out_of_sync_models.is_empty();
        if synced {
            record.sync_status = SyncStatus::Synced;
            record.sync_attempts = 0;
            record.first_out_of_sync_at = None;
            record.grace_period_expires = None;
            record.last_error = None;
        }
        self.save_validator_sync(state, &record)?;

        // Settle this validator's open sync requests that named the model.
        let request_prefix = keys::key2(
            keys::SYNC_REQUEST_BY_VALIDATOR_PREFIX,
            validator.as_ref(),
            b"",
        );
        for (index_key, _) in store::collect_prefix(state, &request_prefix)? {
            let request_id =
                match String::from_utf8(index_key[request_prefix.len()..].to_vec()) {
                    Ok(id) => id,
                    Err(_) => continue,
                };
            let request_key = keys::key1(keys::SYNC_REQUEST_PREFIX, request_id.as_bytes());
            let request: Option<SyncRequest> = store::get_typed(state, &request_key)?;
            let mut request = match request {
                Some(r) => r,
                None => continue,
            };
            if !matches!(
                request.status,
                SyncRequestStatus::Pending | SyncRequestStatus::Partial
            ) {
                continue;
            }
            if !request.outstanding.contains(&params.model_id) {
                continue;
            }
            request.outstanding.retain(|m| m != &params.model_id);
            request.status = if request.outstanding.is_empty() {
                SyncRequestStatus::Complete
            } else {
                SyncRequestStatus::Partial
            };
            store::put_typed(state, &request_key, &request)?;
        }

        sink.emit(IdentityEvent::ValidatorSyncConfirmed {
            validator,
            model_id: params.model_id,
        });
        Ok(ConfirmModelSyncResponse {
            synced,
            height: ctx.block_height,
        })
    }

    /// End-of-block sweep: any validator past its grace period that is not
    /// already in Error moves to Error, with one `SyncDeadlineExpired` event
    /// per out-of-sync model.
    pub fn check_sync_deadlines(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) {
        let snapshot = match store::collect_prefix(state, &[keys::VALIDATOR_SYNC_PREFIX]) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[veid] sync deadline scan failed: {}", e);
                return;
            }
        };
        for (_key, value) in snapshot {
            let mut record: ValidatorModelSync =
                match veid_types::codec::from_bytes_canonical(&value) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("[veid] skipping undecodable sync record: {}", e);
                        continue;
                    }
                };
            if record.sync_status == SyncStatus::Error {
                continue;
            }
            let expires = match record.grace_period_expires {
                Some(t) if t < ctx.block_time => t,
                _ => continue,
            };
            record.sync_status = SyncStatus::Error;
            record.last_error = Some("sync grace period expired".to_string());
            if let Err(e) = self.save_validator_sync(state, &record) {
                log::warn!(
                    "[veid] failed to mark validator {} in error: {}",
                    record.validator,
                    e
                );
                continue;
            }
            log::warn!(
                "[veid] validator {} missed its sync deadline ({} < {})",
                record.validator,
                expires,
                ctx.block_time
            );
            for model_id in &record.out_of_sync_models {
                sink.emit(IdentityEvent::SyncDeadlineExpired {
                    validator: record.validator,
                    model_id: model_id.clone(),
                });
            }
        }
    }
}
