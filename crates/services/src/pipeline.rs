//! Pipeline version governance and execution-record reconciliation.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    sha256, ExecutionComparison, IdentityEvent, ModelManifestEntry, PipelineExecutionRecord,
    PipelineStatus, PipelineVersion,
};
use veid_types::codec;
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `RegisterPipelineVersion`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RegisterPipelineVersionParams {
    /// Version string; the primary key.
    pub version: String,
    /// SHA-256 of the container image.
    pub image_hash: [u8; 32],
    /// Pullable image reference.
    pub image_ref: String,
    /// The ordered model manifest.
    pub model_manifest: Vec<ModelManifestEntry>,
}

/// Response to `RegisterPipelineVersion`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RegisterPipelineVersionResponse {
    /// Hash of the canonical encoding of the manifest.
    pub manifest_hash: [u8; 32],
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `ActivatePipelineVersion`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ActivatePipelineVersionParams {
    /// The version to activate.
    pub version: String,
}

/// Response to `ActivatePipelineVersion`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ActivatePipelineVersionResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `RecordPipelineExecution`, reported by the worker oracle
/// through a validator.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RecordPipelineExecutionParams {
    /// The request this execution served.
    pub request_id: String,
    /// Pipeline version string used.
    pub pipeline_version: String,
    /// Container image hash used.
    pub image_hash: [u8; 32],
    /// Model manifest hash used.
    pub model_manifest_hash: [u8; 32],
    /// Deterministic input hash.
    pub input_hash: [u8; 32],
    /// Deterministic output hash.
    pub output_hash: [u8; 32],
    /// Wall duration of the run, in milliseconds.
    pub execution_duration_ms: u64,
    /// Whether the worker self-verified determinism.
    pub determinism_verified: bool,
}

/// Response to `RecordPipelineExecution`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RecordPipelineExecutionResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    fn pipeline_version_key(version: &str) -> Vec<u8> {
        keys::key1(keys::PIPELINE_VERSION_PREFIX, version.as_bytes())
    }

    pub(crate) fn load_pipeline_version(
        &self,
        state: &dyn StateAccess,
        version: &str,
    ) -> Result<PipelineVersion, IdentityError> {
        let pipeline = store::get_typed(state, &Self::pipeline_version_key(version))?;
        store::require(pipeline, "pipeline version", version)
    }

    /// The currently active pipeline version, if one has been activated.
    pub(crate) fn active_pipeline(
        &self,
        state: &dyn StateAccess,
    ) -> Result<Option<PipelineVersion>, IdentityError> {
        let active: Option<String> = store::get_typed(state, keys::ACTIVE_PIPELINE_KEY)?;
        match active {
            None => Ok(None),
            Some(version) => self.load_pipeline_version(state, &version).map(Some),
        }
    }

    /// Handles `RegisterPipelineVersion`. The manifest hash is derived here,
    /// from the canonical encoding, never supplied by the caller.
    pub fn register_pipeline_version(
        &self,
        state: &mut dyn StateAccess,
        params: RegisterPipelineVersionParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<RegisterPipelineVersionResponse, IdentityError> {
        if params.version.is_empty() {
            return Err(IdentityError::InvalidParameter(
                "pipeline version must not be empty".into(),
            ));
        }
        if params.model_manifest.is_empty() {
            return Err(IdentityError::InvalidParameter(
                "model manifest must not be empty".into(),
            ));
        }
        let key = Self::pipeline_version_key(&params.version);
        if state.get(&key)?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "pipeline version",
                id: params.version,
            });
        }

        let manifest_hash = sha256(&codec::to_bytes_canonical(&params.model_manifest));
        let pipeline = PipelineVersion {
            version: params.version,
            image_hash: params.image_hash,
            image_ref: params.image_ref,
            model_manifest: params.model_manifest,
            manifest_hash,
            status: PipelineStatus::Pending,
            registered_at: ctx.block_time,
            activated_at: None,
        };
        store::put_typed(state, &key, &pipeline)?;

        Ok(RegisterPipelineVersionResponse {
            manifest_hash,
            height: ctx.block_height,
        })
    }

    /// Handles `ActivatePipelineVersion` (authority only). At most one Active
    /// version at any height.
    pub fn activate_pipeline_version(
        &self,
        state: &mut dyn StateAccess,
        params: ActivatePipelineVersionParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<ActivatePipelineVersionResponse, IdentityError> {
        let module_params = store::load_params(state)?;
        if ctx.signer_account_id != module_params.authority {
            return Err(IdentityError::Unauthorized(
                "pipeline activation requires the authority".into(),
            ));
        }

        let mut pipeline = self.load_pipeline_version(state, &params.version)?;
        if pipeline.status == PipelineStatus::Active {
            return Err(IdentityError::Precondition(format!(
                "pipeline version {} is already active",
                params.version
            )));
        }
        if pipeline.status == PipelineStatus::Deprecated {
            return Err(IdentityError::Precondition(format!(
                "pipeline version {} is deprecated",
                params.version
            )));
        }

        if let Some(mut previous) = self.active_pipeline(state)? {
            previous.status = PipelineStatus::Deprecated;
            store::put_typed(
                state,
                &Self::pipeline_version_key(&previous.version),
                &previous,
            )?;
        }

        pipeline.status = PipelineStatus::Active;
        pipeline.activated_at = Some(ctx.block_height);
        store::put_typed(state, &Self::pipeline_version_key(&pipeline.version), &pipeline)?;
        store::put_typed(state, keys::ACTIVE_PIPELINE_KEY, &pipeline.version)?;

        log::info!("[veid] pipeline version {} activated", pipeline.version);
        Ok(ActivatePipelineVersionResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `RecordPipelineExecution`.
    ///
    /// Rejects any record whose (version, image hash, manifest hash) does not
    /// match the active pipeline version, preventing mixed-version outputs
    /// from entering state.
    pub fn record_pipeline_execution(
        &self,
        state: &mut dyn StateAccess,
        params: RecordPipelineExecutionParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<RecordPipelineExecutionResponse, IdentityError> {
        let validator = ctx.signer_account_id;
        if !store::is_bonded_validator(state, &validator)? {
            return Err(IdentityError::Unauthorized(
                "execution records require a bonded validator".into(),
            ));
        }

        let active = store::require(
            self.active_pipeline(state)?,
            "active pipeline version",
            "none",
        )?;
        if params.pipeline_version != active.version {
            return Err(IdentityError::Precondition(format!(
                "execution used pipeline {} but {} is active",
                params.pipeline_version, active.version
            )));
        }
        if params.image_hash != active.image_hash {
            return Err(IdentityError::HashMismatch {
                expected: hex::encode(active.image_hash),
                got: hex::encode(params.image_hash),
            });
        }
        if params.model_manifest_hash != active.manifest_hash {
            return Err(IdentityError::HashMismatch {
                expected: hex::encode(active.manifest_hash),
                got: hex::encode(params.model_manifest_hash),
            });
        }

        let by_validator_key = keys::key2(
            keys::PIPELINE_EXECUTION_BY_VALIDATOR_PREFIX,
            validator.as_ref(),
            params.request_id.as_bytes(),
        );
        if state.get(&by_validator_key)?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "execution record",
                id: params.request_id,
            });
        }

        let record = PipelineExecutionRecord {
            request_id: params.request_id.clone(),
            validator,
            pipeline_version: params.pipeline_version,
            image_hash: params.image_hash,
            model_manifest_hash: params.model_manifest_hash,
            input_hash: params.input_hash,
            output_hash: params.output_hash,
            execution_duration_ms: params.execution_duration_ms,
            determinism_verified: params.determinism_verified,
            block_time: ctx.block_time,
        };
        // Stored by request id (first writer wins) and by (validator,
        // request id) for reconciliation.
        let primary_key = keys::key1(keys::PIPELINE_EXECUTION_PREFIX, params.request_id.as_bytes());
        if state.get(&primary_key)?.is_none() {
            store::put_typed(state, &primary_key, &record)?;
        }
        store::put_typed(state, &by_validator_key, &record)?;

        sink.emit(IdentityEvent::PipelineExecutionRecorded {
            request_id: params.request_id,
            validator,
            output_hash: record.output_hash,
        });
        Ok(RecordPipelineExecutionResponse {
            height: ctx.block_height,
        })
    }

    /// Compares two stored execution records for the same request; the
    /// higher consensus layer treats a mismatch as Byzantine behavior.
    pub fn compare_pipeline_executions(
        &self,
        state: &dyn StateAccess,
        request_id: &str,
        validator_a: &veid_types::app::AccountId,
        validator_b: &veid_types::app::AccountId,
    ) -> Result<ExecutionComparison, IdentityError> {
        let load = |validator: &veid_types::app::AccountId| -> Result<PipelineExecutionRecord, IdentityError> {
            let key = keys::key2(
                keys::PIPELINE_EXECUTION_BY_VALIDATOR_PREFIX,
                validator.as_ref(),
                request_id.as_bytes(),
            );
            let record = store::get_typed(state, &key)?;
            store::require(record, "execution record", request_id)
        };
        let a = load(validator_a)?;
        let b = load(validator_b)?;
        Ok(PipelineExecutionRecord::compare(&a, &b))
    }
}
