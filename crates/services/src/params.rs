//! Parameter governance: full parameter replacement and the borderline
//! subset, both authority-gated.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::error::IdentityError;
use veid_types::service_configs::{BorderlineParams, VeidParams};

/// Parameters for `UpdateParams`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UpdateParamsParams {
    /// The replacement parameter set.
    pub params: VeidParams,
}

/// Response to `UpdateParams`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct UpdateParamsResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `UpdateBorderlineParams`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UpdateBorderlineParamsParams {
    /// The replacement borderline parameters.
    pub borderline: BorderlineParams,
}

/// Response to `UpdateBorderlineParams`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct UpdateBorderlineParamsResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    /// Handles `UpdateParams` (authority only).
    pub fn update_params(
        &self,
        state: &mut dyn StateAccess,
        params: UpdateParamsParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<UpdateParamsResponse, IdentityError> {
        let current = store::load_params(state)?;
        if ctx.signer_account_id != current.authority {
            return Err(IdentityError::Unauthorized(
                "parameter updates require the authority".into(),
            ));
        }
        params.params.validate()?;
        store::save_params(state, &params.params)?;
        log::info!("[veid] module parameters replaced at height {}", ctx.block_height);
        Ok(UpdateParamsResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `UpdateBorderlineParams` (authority only).
    pub fn update_borderline_params(
        &self,
        state: &mut dyn StateAccess,
        params: UpdateBorderlineParamsParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<UpdateBorderlineParamsResponse, IdentityError> {
        let mut current = store::load_params(state)?;
        if ctx.signer_account_id != current.authority {
            return Err(IdentityError::Unauthorized(
                "borderline parameter updates require the authority".into(),
            ));
        }
        current.borderline = params.borderline;
        current.validate()?;
        store::save_params(state, &current)?;
        Ok(UpdateBorderlineParamsResponse {
            height: ctx.block_height,
        })
    }
}
