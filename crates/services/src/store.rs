//! Typed accessors over the raw key-value store.
//!
//! Handlers never touch raw bytes directly; they read and write entities
//! through these helpers so that the canonical codec is applied uniformly.

use parity_scale_codec::{Decode, Encode};
use veid_api::state::StateAccess;
use veid_types::app::AccountId;
use veid_types::codec;
use veid_types::error::{IdentityError, StateError};
use veid_types::keys;
use veid_types::service_configs::VeidParams;
use std::collections::BTreeSet;

/// Reads and decodes an entity, if present.
pub(crate) fn get_typed<T: Decode>(
    state: &dyn StateAccess,
    key: &[u8],
) -> Result<Option<T>, IdentityError> {
    match state.get(key)? {
        None => Ok(None),
        Some(bytes) => codec::from_bytes_canonical(&bytes)
            .map(Some)
            .map_err(|e| StateError::Decode(e).into()),
    }
}

/// Encodes and writes an entity.
pub(crate) fn put_typed<T: Encode>(
    state: &mut dyn StateAccess,
    key: &[u8],
    value: &T,
) -> Result<(), IdentityError> {
    state.insert(key, &codec::to_bytes_canonical(value))?;
    Ok(())
}

/// Unwraps an optional entity into a `NotFound` of the given kind.
pub(crate) fn require<T>(
    value: Option<T>,
    entity: &'static str,
    id: impl Into<String>,
) -> Result<T, IdentityError> {
    value.ok_or_else(|| IdentityError::NotFound {
        entity,
        id: id.into(),
    })
}

/// Writes a set-style secondary index entry.
pub(crate) fn put_index(state: &mut dyn StateAccess, key: &[u8]) -> Result<(), IdentityError> {
    state.insert(key, keys::INDEX_SET_SENTINEL)?;
    Ok(())
}

/// Loads the module parameters, falling back to defaults when genesis has not
/// seeded them.
pub(crate) fn load_params(state: &dyn StateAccess) -> Result<VeidParams, IdentityError> {
    Ok(get_typed(state, keys::PARAMS_KEY)?.unwrap_or_default())
}

/// Persists the module parameters.
pub(crate) fn save_params(
    state: &mut dyn StateAccess,
    params: &VeidParams,
) -> Result<(), IdentityError> {
    put_typed(state, keys::PARAMS_KEY, params)
}

/// Loads the bonded validator set.
pub(crate) fn bonded_validators(
    state: &dyn StateAccess,
) -> Result<BTreeSet<AccountId>, IdentityError> {
    Ok(get_typed(state, keys::VALIDATOR_SET_KEY)?.unwrap_or_default())
}

/// Whether `account` is a bonded validator.
pub(crate) fn is_bonded_validator(
    state: &dyn StateAccess,
    account: &AccountId,
) -> Result<bool, IdentityError> {
    Ok(bonded_validators(state)?.contains(account))
}

/// Whether `account` may resolve appeals: the authority, a bonded validator,
/// or an explicitly whitelisted resolver.
pub(crate) fn is_authorized_resolver(
    state: &dyn StateAccess,
    params: &VeidParams,
    account: &AccountId,
) -> Result<bool, IdentityError> {
    if *account == params.authority || params.authorized_resolvers.contains(account) {
        return Ok(true);
    }
    is_bonded_validator(state, account)
}

/// Collects every (key, value) pair under `prefix` into owned vectors.
///
/// Sweeps mutate while walking an index, so they snapshot the scan first;
/// the snapshot is bounded by the partition they own.
pub(crate) fn collect_prefix(
    state: &dyn StateAccess,
    prefix: &[u8],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, IdentityError> {
    let mut out = Vec::new();
    for item in state.prefix_scan(prefix)? {
        out.push(item?);
    }
    Ok(out)
}
