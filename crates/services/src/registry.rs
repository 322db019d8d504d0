//! The ML model registry: registration, update proposals, delayed activation
//! and the per-block activation sweep.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    IdentityEvent, MlModelInfo, ModelStatus, ModelType, ModelUpdateProposal,
    ModelVersionHistoryEntry, ModelVersionState, ProposalStatus,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `RegisterModel`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RegisterModelParams {
    /// Unique model id.
    pub model_id: String,
    /// The purpose this model serves.
    pub model_type: ModelType,
    /// Human-readable version string.
    pub version: String,
    /// SHA-256 of the model artifact.
    pub sha256_hash: [u8; 32],
}

/// Response to `RegisterModel`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RegisterModelResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `ProposeModelUpdate`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ProposeModelUpdateParams {
    /// The model type being updated.
    pub model_type: ModelType,
    /// The registered model to activate.
    pub model_id: String,
}

/// Response to `ProposeModelUpdate`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ProposeModelUpdateResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `ApproveModelProposal`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ApproveModelProposalParams {
    /// The model type whose pending proposal is approved.
    pub model_type: ModelType,
}

/// Response to `ApproveModelProposal`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ApproveModelProposalResponse {
    /// The height at which the activation will apply.
    pub activation_height: u64,
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    pub(crate) fn model_key(model_id: &str) -> Vec<u8> {
        keys::key1(keys::MODEL_PREFIX, model_id.as_bytes())
    }

    fn proposal_key(model_type: ModelType) -> Vec<u8> {
        keys::key1(keys::MODEL_PROPOSAL_PREFIX, &[model_type.key_byte()])
    }

    fn pending_activation_key(activation_height: u64, model_type: ModelType) -> Vec<u8> {
        keys::time_ordered_key(
            keys::PENDING_ACTIVATION_PREFIX,
            activation_height,
            &[model_type.key_byte()],
        )
    }

    pub(crate) fn load_model(
        &self,
        state: &dyn StateAccess,
        model_id: &str,
    ) -> Result<MlModelInfo, IdentityError> {
        let model = store::get_typed(state, &Self::model_key(model_id))?;
        store::require(model, "model", model_id)
    }

    pub(crate) fn save_model(
        &self,
        state: &mut dyn StateAccess,
        model: &MlModelInfo,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::model_key(&model.model_id), model)
    }

    pub(crate) fn model_version_state(
        &self,
        state: &dyn StateAccess,
    ) -> Result<ModelVersionState, IdentityError> {
        Ok(store::get_typed(state, keys::MODEL_VERSION_STATE_KEY)?.unwrap_or_default())
    }

    /// The single authority source for whether a validator-reported hash is
    /// canonical for a model type.
    pub fn validate_model_hash(
        &self,
        state: &dyn StateAccess,
        model_type: ModelType,
        hash: &[u8; 32],
    ) -> Result<(), IdentityError> {
        let versions = self.model_version_state(state)?;
        let active_id = store::require(
            versions.active.get(&model_type).cloned(),
            "active model",
            format!("{:?}", model_type),
        )?;
        let active = self.load_model(state, &active_id)?;
        if active.sha256_hash != *hash {
            return Err(IdentityError::HashMismatch {
                expected: hex::encode(active.sha256_hash),
                got: hex::encode(hash),
            });
        }
        Ok(())
    }

    /// Handles `RegisterModel`. The model starts Pending; only an approved
    /// proposal activates it.
    pub fn register_model(
        &self,
        state: &mut dyn StateAccess,
        params: RegisterModelParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<RegisterModelResponse, IdentityError> {
        if params.model_id.is_empty() {
            return Err(IdentityError::InvalidParameter("model id must not be empty".into()));
        }
        if state.get(&Self::model_key(&params.model_id))?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "model",
                id: params.model_id,
            });
        }

        let model = MlModelInfo {
            model_id: params.model_id.clone(),
            model_type: params.model_type,
            version: params.version.clone(),
            sha256_hash: params.sha256_hash,
            status: ModelStatus::Pending,
            registered_by: ctx.signer_account_id,
            governance_id: None,
            registered_at: ctx.block_time,
            activated_at: None,
        };
        self.save_model(state, &model)?;
        store::put_index(
            state,
            &keys::key2(
                keys::MODELS_BY_TYPE_PREFIX,
                &[params.model_type.key_byte()],
                params.model_id.as_bytes(),
            ),
        )?;

        sink.emit(IdentityEvent::ModelRegistered {
            model_id: params.model_id,
            model_type: params.model_type,
            version: params.version,
        });
        Ok(RegisterModelResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `ProposeModelUpdate`. At most one Pending proposal per type.
    pub fn propose_model_update(
        &self,
        state: &mut dyn StateAccess,
        params: ProposeModelUpdateParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ProposeModelUpdateResponse, IdentityError> {
        let model = self.load_model(state, &params.model_id)?;
        if model.model_type != params.model_type {
            return Err(IdentityError::InvalidParameter(format!(
                "model {} is not of the proposed type",
                params.model_id
            )));
        }
        if model.status != ModelStatus::Pending {
            return Err(IdentityError::Precondition(format!(
                "model {} is not pending activation",
                params.model_id
            )));
        }

        let key = Self::proposal_key(params.model_type);
        if let Some(existing) = store::get_typed::<ModelUpdateProposal>(state, &key)? {
            if existing.status == ProposalStatus::Pending
                || existing.status == ProposalStatus::Approved
            {
                return Err(IdentityError::AlreadyExists {
                    entity: "model proposal",
                    id: format!("{:?}", params.model_type),
                });
            }
        }

        let proposal = ModelUpdateProposal {
            model_type: params.model_type,
            model_id: params.model_id.clone(),
            proposed_by: ctx.signer_account_id,
            created_at_height: ctx.block_height,
            status: ProposalStatus::Pending,
            activation_height: None,
        };
        store::put_typed(state, &key, &proposal)?;

        sink.emit(IdentityEvent::ModelProposalCreated {
            model_type: params.model_type,
            model_id: params.model_id,
        });
        Ok(ProposeModelUpdateResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `ApproveModelProposal` (authority only). The proposal gains
    /// `activation_height = current + activation_delay` and is queued.
    pub fn approve_model_proposal(
        &self,
        state: &mut dyn StateAccess,
        params: ApproveModelProposalParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ApproveModelProposalResponse, IdentityError> {
        let module_params = store::load_params(state)?;
        if ctx.signer_account_id != module_params.authority {
            return Err(IdentityError::Unauthorized(
                "proposal approval requires the authority".into(),
            ));
        }

        let key = Self::proposal_key(params.model_type);
        let proposal: Option<ModelUpdateProposal> = store::get_typed(state, &key)?;
        let mut proposal = store::require(proposal, "model proposal", format!("{:?}", params.model_type))?;
        if proposal.status != ProposalStatus::Pending {
            return Err(IdentityError::Precondition(format!(
                "proposal for {:?} is not pending",
                params.model_type
            )));
        }

        let activation_height = ctx.block_height + module_params.model.activation_delay_blocks;
        proposal.status = ProposalStatus::Approved;
        proposal.activation_height = Some(activation_height);
        store::put_typed(state, &key, &proposal)?;
        store::put_index(
            state,
            &Self::pending_activation_key(activation_height, params.model_type),
        )?;

        sink.emit(IdentityEvent::ModelProposalApproved {
            model_type: params.model_type,
            model_id: proposal.model_id,
            activation_height,
        });
        Ok(ApproveModelProposalResponse {
            activation_height,
            height: ctx.block_height,
        })
    }

    /// Applies one approved activation: deprecate the current active model,
    /// point the version singleton at the new one, append history.
    fn activate_pending_model(
        &self,
        state: &mut dyn StateAccess,
        model_type: ModelType,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<(), IdentityError> {
        let proposal_key = Self::proposal_key(model_type);
        let proposal: Option<ModelUpdateProposal> = store::get_typed(state, &proposal_key)?;
        let mut proposal =
            store::require(proposal, "model proposal", format!("{:?}", model_type))?;
        if proposal.status != ProposalStatus::Approved {
            return Err(IdentityError::Precondition(format!(
                "proposal for {:?} is not approved",
                model_type
            )));
        }

        let mut versions = self.model_version_state(state)?;
        let replaced = versions.active.get(&model_type).cloned();
        if let Some(previous_id) = &replaced {
            let mut previous = self.load_model(state, previous_id)?;
            previous.status = ModelStatus::Deprecated;
            self.save_model(state, &previous)?;
        }

        let mut model = self.load_model(state, &proposal.model_id)?;
        model.status = ModelStatus::Active;
        model.activated_at = Some(ctx.block_height);
        self.save_model(state, &model)?;

        versions
            .active
            .insert(model_type, proposal.model_id.clone());
        store::put_typed(state, keys::MODEL_VERSION_STATE_KEY, &versions)?;

        let history_key = keys::key2(
            keys::MODEL_VERSION_HISTORY_PREFIX,
            &[model_type.key_byte()],
            &ctx.block_height.to_be_bytes(),
        );
        store::put_typed(
            state,
            &history_key,
            &ModelVersionHistoryEntry {
                model_type,
                model_id: model.model_id.clone(),
                version: model.version.clone(),
                height: ctx.block_height,
                time: ctx.block_time,
            },
        )?;

        proposal.status = ProposalStatus::Activated;
        store::put_typed(state, &proposal_key, &proposal)?;

        sink.emit(IdentityEvent::ModelActivated {
            model_type,
            model_id: model.model_id,
            replaced,
        });
        Ok(())
    }

    /// Begin-of-block sweep: applies every queued activation whose height has
    /// arrived, in index order. Failures on single entries are logged and
    /// skipped.
    pub fn process_pending_activations(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) {
        let snapshot = match store::collect_prefix(state, &[keys::PENDING_ACTIVATION_PREFIX]) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[veid] pending activation scan failed: {}", e);
                return;
            }
        };
        for (index_key, _) in snapshot {
            match keys::time_component(&index_key) {
                Some(activation_height) if activation_height <= ctx.block_height => {}
                _ => break,
            }
            let type_byte = match index_key.last() {
                Some(b) => *b,
                None => continue,
            };
            let model_type = match Self::model_type_from_key_byte(type_byte) {
                Some(t) => t,
                None => {
                    log::warn!("[veid] unknown model type byte {:#04x} in activation queue", type_byte);
                    continue;
                }
            };
            if let Err(e) = state.delete(&index_key) {
                log::warn!("[veid] failed to dequeue activation for {:?}: {}", model_type, e);
                continue;
            }
            if let Err(e) = self.activate_pending_model(state, model_type, ctx, sink) {
                log::warn!("[veid] activation for {:?} failed: {}", model_type, e);
            }
        }
    }

    pub(crate) fn model_type_from_key_byte(byte: u8) -> Option<ModelType> {
        match byte {
            0x01 => Some(ModelType::FaceRecognition),
            0x02 => Some(ModelType::DocumentAuthenticity),
            0x03 => Some(ModelType::Liveness),
            0x04 => Some(ModelType::TextExtraction),
            0x05 => Some(ModelType::RiskScoring),
            0x06 => Some(ModelType::FeatureEmbedding),
            _ => None,
        }
    }
}
