//! The delegation state machine: creation, atomic use, revocation and the
//! by-expiry sweep.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeSet;
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    domain_hash, AccountId, DelegationRecord, DelegationStatus, IdentityEvent,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `CreateDelegation`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct CreateDelegationParams {
    /// The receiving account.
    pub delegate: AccountId,
    /// Granted permissions. Must be non-empty.
    pub permissions: BTreeSet<String>,
    /// Expiry time; must exceed the current block time.
    pub expires_at: u64,
    /// Total allowed uses. Must be positive.
    pub max_uses: u32,
}

/// Response to `CreateDelegation`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct CreateDelegationResponse {
    /// The new delegation id.
    pub delegation_id: String,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `RevokeDelegation`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RevokeDelegationParams {
    /// The delegation to revoke.
    pub delegation_id: String,
    /// The stated reason.
    pub reason: String,
}

/// Response to `RevokeDelegation`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RevokeDelegationResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `UseDelegation`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UseDelegationParams {
    /// The delegation being exercised.
    pub delegation_id: String,
    /// The permission being exercised.
    pub permission: String,
}

/// Response to `UseDelegation`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct UseDelegationResponse {
    /// Uses remaining after the decrement.
    pub uses_remaining: u32,
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    pub(crate) fn delegation_key(delegation_id: &str) -> Vec<u8> {
        keys::key1(keys::DELEGATION_PREFIX, delegation_id.as_bytes())
    }

    fn expiry_queue_key(record: &DelegationRecord) -> Vec<u8> {
        keys::time_ordered_key(
            keys::DELEGATION_BY_EXPIRY_PREFIX,
            record.expires_at,
            record.delegation_id.as_bytes(),
        )
    }

    pub(crate) fn load_delegation(
        &self,
        state: &dyn StateAccess,
        delegation_id: &str,
    ) -> Result<DelegationRecord, IdentityError> {
        let record = store::get_typed(state, &Self::delegation_key(delegation_id))?;
        store::require(record, "delegation", delegation_id)
    }

    pub(crate) fn save_delegation(
        &self,
        state: &mut dyn StateAccess,
        record: &DelegationRecord,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::delegation_key(&record.delegation_id), record)
    }

    /// Handles `CreateDelegation`.
    pub fn create_delegation(
        &self,
        state: &mut dyn StateAccess,
        params: CreateDelegationParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<CreateDelegationResponse, IdentityError> {
        let delegator = ctx.signer_account_id;
        if params.delegate == delegator {
            return Err(IdentityError::InvalidParameter(
                "cannot delegate to oneself".into(),
            ));
        }
        if params.permissions.is_empty() {
            return Err(IdentityError::InvalidParameter(
                "permission set must not be empty".into(),
            ));
        }
        if params.expires_at <= ctx.block_time {
            return Err(IdentityError::InvalidParameter(
                "expiry must be in the future".into(),
            ));
        }
        if params.max_uses == 0 {
            return Err(IdentityError::InvalidParameter(
                "max_uses must be positive".into(),
            ));
        }
        // The delegator must hold a wallet; delegations carry identity-derived
        // permissions.
        self.load_active_wallet(state, &delegator)?;

        let delegation_id = hex::encode(domain_hash(
            b"VEID-DELEGATION-ID::V1",
            &[
                delegator.as_ref(),
                params.delegate.as_ref(),
                &ctx.block_time_ns().to_be_bytes(),
            ],
        ));
        if state.get(&Self::delegation_key(&delegation_id))?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "delegation",
                id: delegation_id,
            });
        }

        let record = DelegationRecord {
            delegation_id: delegation_id.clone(),
            delegator,
            delegate: params.delegate,
            permissions: params.permissions,
            created_at: ctx.block_time,
            expires_at: params.expires_at,
            max_uses: params.max_uses,
            uses_remaining: params.max_uses,
            status: DelegationStatus::Active,
            revocation_reason: None,
        };
        self.save_delegation(state, &record)?;
        store::put_index(
            state,
            &keys::key2(
                keys::DELEGATION_BY_DELEGATOR_PREFIX,
                delegator.as_ref(),
                delegation_id.as_bytes(),
            ),
        )?;
        store::put_index(
            state,
            &keys::key2(
                keys::DELEGATION_BY_DELEGATE_PREFIX,
                params.delegate.as_ref(),
                delegation_id.as_bytes(),
            ),
        )?;
        store::put_index(state, &Self::expiry_queue_key(&record))?;

        sink.emit(IdentityEvent::DelegationCreated {
            delegation_id: delegation_id.clone(),
            delegator,
            delegate: params.delegate,
        });
        Ok(CreateDelegationResponse {
            delegation_id,
            height: ctx.block_height,
        })
    }

    /// Handles `RevokeDelegation` by the delegator (or the authority).
    pub fn revoke_delegation(
        &self,
        state: &mut dyn StateAccess,
        params: RevokeDelegationParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<RevokeDelegationResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        let mut record = self.load_delegation(state, &params.delegation_id)?;
        if caller != record.delegator && caller != module_params.authority {
            return Err(IdentityError::Unauthorized(
                "only the delegator or the authority may revoke".into(),
            ));
        }
        if record.status != DelegationStatus::Active {
            return Err(IdentityError::Precondition(format!(
                "delegation {} is not active",
                params.delegation_id
            )));
        }

        record.status = DelegationStatus::Revoked;
        record.revocation_reason = Some(params.reason.clone());
        self.save_delegation(state, &record)?;

        sink.emit(IdentityEvent::DelegationRevoked {
            delegation_id: params.delegation_id,
            reason: params.reason,
        });
        Ok(RevokeDelegationResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `UseDelegation`: validate, decrement, exhaust, persist — all
    /// within this single handler, so no observer sees an intermediate state.
    pub fn use_delegation(
        &self,
        state: &mut dyn StateAccess,
        params: UseDelegationParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<UseDelegationResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let mut record = self.load_delegation(state, &params.delegation_id)?;
        if record.delegate != caller {
            return Err(IdentityError::Unauthorized(
                "only the delegate may use a delegation".into(),
            ));
        }
        if record.status != DelegationStatus::Active {
            return Err(IdentityError::Precondition(format!(
                "delegation {} is not active",
                params.delegation_id
            )));
        }
        if record.expires_at <= ctx.block_time {
            return Err(IdentityError::Expired(format!(
                "delegation {} has expired",
                params.delegation_id
            )));
        }
        if !record.permissions.contains(&params.permission) {
            return Err(IdentityError::Unauthorized(format!(
                "permission '{}' is not granted by delegation {}",
                params.permission, params.delegation_id
            )));
        }

        record.uses_remaining -= 1;
        if record.uses_remaining == 0 {
            record.status = DelegationStatus::Exhausted;
        }
        self.save_delegation(state, &record)?;

        sink.emit(IdentityEvent::DelegationUsed {
            delegation_id: params.delegation_id.clone(),
            permission: params.permission,
            uses_remaining: record.uses_remaining,
        });
        if record.status == DelegationStatus::Exhausted {
            sink.emit(IdentityEvent::AuthorizationConsumed {
                account: record.delegate,
                reference: params.delegation_id,
            });
        }
        Ok(UseDelegationResponse {
            uses_remaining: record.uses_remaining,
            height: ctx.block_height,
        })
    }

    /// End-of-block sweep: walks the by-expiry index in ascending order and
    /// stops at the first entry that has not yet expired.
    pub fn expire_delegations(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) {
        let snapshot = match store::collect_prefix(state, &[keys::DELEGATION_BY_EXPIRY_PREFIX]) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[veid] delegation expiry scan failed: {}", e);
                return;
            }
        };
        for (index_key, _) in snapshot {
            match keys::time_component(&index_key) {
                Some(expires_at) if expires_at <= ctx.block_time => {}
                _ => break,
            }
            let id_start = 1 + 8 + 1;
            let delegation_id = match index_key
                .get(id_start..)
                .and_then(|b| String::from_utf8(b.to_vec()).ok())
            {
                Some(id) => id,
                None => {
                    log::warn!("[veid] malformed delegation expiry key; skipping");
                    continue;
                }
            };
            if let Err(e) = state.delete(&index_key) {
                log::warn!("[veid] failed to dequeue delegation {}: {}", delegation_id, e);
                continue;
            }
            let mut record = match self.load_delegation(state, &delegation_id) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!(
                        "[veid] expiry index pointed at missing delegation {}: {}",
                        delegation_id,
                        e
                    );
                    continue;
                }
            };
            if record.status != DelegationStatus::Active {
                continue;
            }
            record.status = DelegationStatus::Expired;
            if let Err(e) = self.save_delegation(state, &record) {
                log::warn!("[veid] failed to expire delegation {}: {}", delegation_id, e);
                continue;
            }
            sink.emit(IdentityEvent::DelegationExpired {
                delegation_id: record.delegation_id,
            });
        }
    }
}
