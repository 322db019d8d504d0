#![forbid(unsafe_code)]

//! The VEID identity module.
//!
//! A deterministic state machine over an ordered key-value store: identity
//! wallets and scopes, verification appeals, permission delegations, ML model
//! governance with delayed activation, the validator model-sync protocol,
//! pipeline execution reconciliation, composite scoring with tier
//! transitions, GDPR erasure and borderline MFA fallbacks.
//!
//! Every external effect enters through [`VeidModule::handle`]; periodic
//! sweeps run in the [`OnBeginBlock`]/[`OnEndBlock`] hooks. All timestamps
//! and heights come from the block header, never from a wall clock.

pub mod appeal;
pub mod biometric;
pub mod delegation;
pub mod erasure;
pub mod fallback;
pub mod params;
pub mod pipeline;
pub mod queries;
pub mod registry;
pub mod router;
pub mod scope;
pub mod scoring;
mod store;
pub mod sync;
pub mod wallet;

use std::collections::BTreeSet;
use std::sync::Arc;
use veid_api::events::EventSink;
use veid_api::lifecycle::{OnBeginBlock, OnEndBlock};
use veid_api::oracle::MfaOracle;
use veid_api::services::{BlockchainService, Capabilities};
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::AccountId;
use veid_types::error::{IdentityError, StateError};
use veid_types::service_configs::VeidParams;

/// The VEID module service.
///
/// Stateless between blocks apart from the KV store; the only held
/// collaborator is the external MFA oracle seam.
pub struct VeidModule {
    pub(crate) mfa: Arc<dyn MfaOracle>,
}

impl VeidModule {
    /// Creates the module with its MFA oracle adapter.
    pub fn new(mfa: Arc<dyn MfaOracle>) -> Self {
        Self { mfa }
    }

    /// Seeds the parameter singleton and the bonded validator set, and
    /// creates a fresh sync record for every genesis validator.
    pub fn init_genesis(
        &self,
        state: &mut dyn StateAccess,
        params: &VeidParams,
        validators: &BTreeSet<AccountId>,
    ) -> Result<(), IdentityError> {
        params.validate()?;
        store::save_params(state, params)?;
        store::put_typed(state, veid_types::keys::VALIDATOR_SET_KEY, validators)?;
        for validator in validators {
            let key = veid_types::keys::key1(
                veid_types::keys::VALIDATOR_SYNC_PREFIX,
                validator.as_ref(),
            );
            if state.get(&key)?.is_none() {
                store::put_typed(
                    state,
                    &key,
                    &veid_types::app::ValidatorModelSync::new(*validator),
                )?;
            }
        }
        Ok(())
    }
}

impl BlockchainService for VeidModule {
    fn id(&self) -> &str {
        "veid"
    }

    fn abi_version(&self) -> u32 {
        1
    }

    fn state_schema(&self) -> &str {
        "v1"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ON_BEGIN_BLOCK | Capabilities::ON_END_BLOCK
    }

    fn as_on_begin_block(&self) -> Option<&dyn OnBeginBlock> {
        Some(self)
    }

    fn as_on_end_block(&self) -> Option<&dyn OnEndBlock> {
        Some(self)
    }
}

impl OnBeginBlock for VeidModule {
    fn on_begin_block(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<(), StateError> {
        // Due model activations apply before any message in the block, so
        // every handler in the block sees the post-activation registry.
        self.process_pending_activations(state, ctx, sink);
        Ok(())
    }
}

impl OnEndBlock for VeidModule {
    fn on_end_block(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<(), StateError> {
        // Each sweep isolates per-item failures: one bad record is logged and
        // skipped, never aborting the block. Sync deadline checks run last so
        // that confirmations delivered in this block are already applied.
        self.expire_stale_scopes(state, ctx, sink);
        let released = self.expire_stale_appeals(state, ctx);
        if released > 0 {
            log::info!("[veid] released {} stale appeal claims", released);
        }
        self.expire_delegations(state, ctx, sink);
        self.expire_borderline_fallbacks(state, ctx, sink);
        self.process_overdue_erasure_requests(state, ctx, sink);
        self.check_sync_deadlines(state, ctx, sink);
        Ok(())
    }
}
