//! Read-only accessors backing the external query surface.
//!
//! Queries never mutate state and see the consistent snapshot the storage
//! engine provides.

use crate::store;
use crate::VeidModule;
use veid_api::state::StateAccess;
use veid_types::app::{
    AccountId, AppealRecord, BorderlineFallbackRecord, DelegationRecord, ErasureRequest,
    IdentityScope, MlModelInfo, ModelType, ValidatorModelSync, Wallet,
};
use veid_types::error::IdentityError;
use veid_types::keys;

impl VeidModule {
    /// The wallet for an account, if one exists.
    pub fn query_wallet(
        &self,
        state: &dyn StateAccess,
        account: &AccountId,
    ) -> Result<Option<Wallet>, IdentityError> {
        store::get_typed(state, &Self::wallet_key(account))
    }

    /// A scope by id.
    pub fn query_scope(
        &self,
        state: &dyn StateAccess,
        scope_id: &str,
    ) -> Result<Option<IdentityScope>, IdentityError> {
        store::get_typed(state, &Self::scope_key(scope_id))
    }

    /// An appeal by id.
    pub fn query_appeal(
        &self,
        state: &dyn StateAccess,
        appeal_id: &str,
    ) -> Result<Option<AppealRecord>, IdentityError> {
        store::get_typed(state, &Self::appeal_key(appeal_id))
    }

    /// All appeals submitted by an account, in submission-time order.
    pub fn query_appeals_by_account(
        &self,
        state: &dyn StateAccess,
        account: &AccountId,
    ) -> Result<Vec<AppealRecord>, IdentityError> {
        let prefix = keys::key2(keys::APPEAL_BY_ACCOUNT_PREFIX, account.as_ref(), b"");
        let mut appeals = Vec::new();
        for (index_key, _) in store::collect_prefix(state, &prefix)? {
            // Layout: <prefix>{account}/{time_be}/{appeal_id}
            let id_start = prefix.len() + 8 + 1;
            if let Some(id) = index_key
                .get(id_start..)
                .and_then(|b| String::from_utf8(b.to_vec()).ok())
            {
                if let Some(appeal) = self.query_appeal(state, &id)? {
                    appeals.push(appeal);
                }
            }
        }
        Ok(appeals)
    }

    /// The most recently submitted appeal for an account, read by walking the
    /// time-ordered index backwards.
    pub fn query_latest_appeal_by_account(
        &self,
        state: &dyn StateAccess,
        account: &AccountId,
    ) -> Result<Option<AppealRecord>, IdentityError> {
        let prefix = keys::key2(keys::APPEAL_BY_ACCOUNT_PREFIX, account.as_ref(), b"");
        let id_start = prefix.len() + 8 + 1;
        for item in state.prefix_scan_rev(&prefix)? {
            let (index_key, _) = item?;
            if let Some(id) = index_key
                .get(id_start..)
                .and_then(|b| String::from_utf8(b.to_vec()).ok())
            {
                return self.query_appeal(state, &id);
            }
        }
        Ok(None)
    }

    /// All delegations granted by an account.
    pub fn query_delegations_by_delegator(
        &self,
        state: &dyn StateAccess,
        delegator: &AccountId,
    ) -> Result<Vec<DelegationRecord>, IdentityError> {
        let prefix = keys::key2(keys::DELEGATION_BY_DELEGATOR_PREFIX, delegator.as_ref(), b"");
        let mut records = Vec::new();
        for (index_key, _) in store::collect_prefix(state, &prefix)? {
            if let Some(id) = index_key
                .get(prefix.len()..)
                .and_then(|b| String::from_utf8(b.to_vec()).ok())
            {
                records.push(self.load_delegation(state, &id)?);
            }
        }
        Ok(records)
    }

    /// The active model for a type, if one has been activated.
    pub fn query_active_model(
        &self,
        state: &dyn StateAccess,
        model_type: ModelType,
    ) -> Result<Option<MlModelInfo>, IdentityError> {
        let versions = self.model_version_state(state)?;
        match versions.active.get(&model_type) {
            None => Ok(None),
            Some(id) => self.load_model(state, id).map(Some),
        }
    }

    /// A validator's sync record. Absent validators report as freshly synced.
    pub fn query_validator_sync(
        &self,
        state: &dyn StateAccess,
        validator: &AccountId,
    ) -> Result<ValidatorModelSync, IdentityError> {
        self.load_validator_sync(state, validator)
    }

    /// An erasure request by id.
    pub fn query_erasure_request(
        &self,
        state: &dyn StateAccess,
        request_id: &str,
    ) -> Result<Option<ErasureRequest>, IdentityError> {
        let request = self.load_erasure_request(state, request_id);
        match request {
            Ok(r) => Ok(Some(r)),
            Err(IdentityError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// A borderline fallback by id.
    pub fn query_fallback(
        &self,
        state: &dyn StateAccess,
        fallback_id: &str,
    ) -> Result<Option<BorderlineFallbackRecord>, IdentityError> {
        match self.load_fallback(state, fallback_id) {
            Ok(r) => Ok(Some(r)),
            Err(IdentityError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
