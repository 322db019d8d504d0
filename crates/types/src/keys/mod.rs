//! Defines the byte-stable key layout of the VEID keyspace.
//!
//! Every entity is persisted under a single-byte type prefix. Composite keys
//! use the byte `/` as a separator within a partition, and integer components
//! are big-endian so that the storage engine's ordered iteration yields them
//! in ascending numeric order. The prefix bytes are consensus-critical and
//! fixed at genesis; changing any of them is a hard fork.

/// The separator byte used inside composite keys.
pub const KEY_SEPARATOR: u8 = b'/';

/// The sentinel value stored under set-style secondary index entries.
pub const INDEX_SET_SENTINEL: &[u8] = &[0x01];

// --- Erasure partition (0x50..=0x55) ---
/// ErasureRequest, by request id.
pub const ERASURE_REQUEST_PREFIX: u8 = 0x50;
/// ErasureRequest index, by requester address.
pub const ERASURE_BY_ADDRESS_PREFIX: u8 = 0x51;
/// Pending erasure queue, ordered by deadline.
pub const PENDING_ERASURE_PREFIX: u8 = 0x52;
/// KeyDestructionRecord, by record id.
pub const KEY_DESTRUCTION_PREFIX: u8 = 0x53;
/// KeyDestructionRecord index, by account.
pub const KEY_DESTRUCTION_BY_ACCOUNT_PREFIX: u8 = 0x54;
/// Legal hold marker, by account.
pub const LEGAL_HOLD_PREFIX: u8 = 0x55;

// --- Validator sync partition (0x75..=0x7B) ---
/// ValidatorModelSync, by validator address.
pub const VALIDATOR_SYNC_PREFIX: u8 = 0x75;
/// SyncRequest, by request id.
pub const SYNC_REQUEST_PREFIX: u8 = 0x76;
/// SyncRequest index, by validator address.
pub const SYNC_REQUEST_BY_VALIDATOR_PREFIX: u8 = 0x77;
/// SyncConfirmation, by confirmation id.
pub const SYNC_CONFIRMATION_PREFIX: u8 = 0x78;
/// SyncConfirmation index, by validator address.
pub const SYNC_CONFIRMATION_BY_VALIDATOR_PREFIX: u8 = 0x79;
/// ModelBroadcast, by broadcast id.
pub const MODEL_BROADCAST_PREFIX: u8 = 0x7A;
/// ModelBroadcast index, by model id.
pub const MODEL_BROADCAST_BY_MODEL_PREFIX: u8 = 0x7B;

// --- Wallet and scope partition ---
/// Wallet, by account address.
pub const WALLET_PREFIX: u8 = 0x10;
/// IdentityScope, by scope id.
pub const SCOPE_PREFIX: u8 = 0x20;
/// Scope index, by owning account.
pub const SCOPE_BY_ACCOUNT_PREFIX: u8 = 0x21;

// --- Appeal partition ---
/// AppealRecord, by appeal id.
pub const APPEAL_PREFIX: u8 = 0x30;
/// Appeal index, by submitter address.
pub const APPEAL_BY_ACCOUNT_PREFIX: u8 = 0x31;
/// Appeal index, by disputed scope.
pub const APPEAL_BY_SCOPE_PREFIX: u8 = 0x32;
/// Pending appeal queue, ordered by submission time.
pub const PENDING_APPEAL_PREFIX: u8 = 0x33;
/// Monotonic appeal counter, per (account, scope).
pub const APPEAL_COUNT_PREFIX: u8 = 0x34;

// --- Delegation partition ---
/// DelegationRecord, by delegation id.
pub const DELEGATION_PREFIX: u8 = 0x40;
/// Delegation index, by delegator.
pub const DELEGATION_BY_DELEGATOR_PREFIX: u8 = 0x41;
/// Delegation index, by delegate.
pub const DELEGATION_BY_DELEGATE_PREFIX: u8 = 0x42;
/// Delegation expiry queue, ordered by expires_at.
pub const DELEGATION_BY_EXPIRY_PREFIX: u8 = 0x43;

// --- Model registry partition ---
/// MLModelInfo, by model id.
pub const MODEL_PREFIX: u8 = 0x60;
/// Model index, by model type.
pub const MODELS_BY_TYPE_PREFIX: u8 = 0x61;
/// ModelUpdateProposal, by model type (at most one pending per type).
pub const MODEL_PROPOSAL_PREFIX: u8 = 0x62;
/// Pending activation queue, ordered by activation height.
pub const PENDING_ACTIVATION_PREFIX: u8 = 0x63;
/// The ModelVersionState singleton.
pub const MODEL_VERSION_STATE_PREFIX: u8 = 0x64;
/// ModelVersionHistory, by (model type, height).
pub const MODEL_VERSION_HISTORY_PREFIX: u8 = 0x65;

// --- Pipeline partition ---
/// PipelineVersion, by version string.
pub const PIPELINE_VERSION_PREFIX: u8 = 0x70;
/// The active pipeline version singleton.
pub const ACTIVE_PIPELINE_PREFIX: u8 = 0x71;
/// PipelineExecutionRecord, by request id.
pub const PIPELINE_EXECUTION_PREFIX: u8 = 0x72;
/// PipelineExecutionRecord, by (validator address, request id).
pub const PIPELINE_EXECUTION_BY_VALIDATOR_PREFIX: u8 = 0x73;

// --- Borderline fallback partition ---
/// BorderlineFallbackRecord, by fallback id.
pub const FALLBACK_PREFIX: u8 = 0x80;
/// Fallback pointer index, by MFA challenge id.
pub const FALLBACK_BY_CHALLENGE_PREFIX: u8 = 0x81;
/// Fallback expiry queue, ordered by expires_at.
pub const FALLBACK_BY_EXPIRY_PREFIX: u8 = 0x82;

// --- Biometric partition ---
/// BiometricTemplateHash, by hash id.
pub const BIOMETRIC_HASH_PREFIX: u8 = 0x90;
/// Biometric hash index, by account.
pub const BIOMETRIC_BY_ACCOUNT_PREFIX: u8 = 0x91;

// --- Module singletons ---
/// The module parameter singleton.
pub const PARAMS_PREFIX: u8 = 0xA0;
/// The bonded validator set singleton.
pub const VALIDATOR_SET_PREFIX: u8 = 0xA1;

/// The full key of the module parameter singleton.
pub const PARAMS_KEY: &[u8] = &[PARAMS_PREFIX];
/// The full key of the bonded validator set singleton.
pub const VALIDATOR_SET_KEY: &[u8] = &[VALIDATOR_SET_PREFIX];
/// The full key of the ModelVersionState singleton.
pub const MODEL_VERSION_STATE_KEY: &[u8] = &[MODEL_VERSION_STATE_PREFIX];
/// The full key of the active pipeline version singleton.
pub const ACTIVE_PIPELINE_KEY: &[u8] = &[ACTIVE_PIPELINE_PREFIX];

/// `<prefix>{a}`
pub fn key1(prefix: u8, a: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(1 + a.len());
    k.push(prefix);
    k.extend_from_slice(a);
    k
}

/// `<prefix>{a}/{b}`
pub fn key2(prefix: u8, a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(2 + a.len() + b.len());
    k.push(prefix);
    k.extend_from_slice(a);
    k.push(KEY_SEPARATOR);
    k.extend_from_slice(b);
    k
}

/// `<prefix>{a}/{b}/{c}`
pub fn key3(prefix: u8, a: &[u8], b: &[u8], c: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(3 + a.len() + b.len() + c.len());
    k.push(prefix);
    k.extend_from_slice(a);
    k.push(KEY_SEPARATOR);
    k.extend_from_slice(b);
    k.push(KEY_SEPARATOR);
    k.extend_from_slice(c);
    k
}

/// A time-ordered queue key: `<prefix>{timestamp_be}/{id}`.
///
/// Ordered iteration over the prefix yields entries in ascending time order;
/// sweeps stop at the first entry whose time component exceeds `now`.
pub fn time_ordered_key(prefix: u8, at: u64, id: &[u8]) -> Vec<u8> {
    key2(prefix, &at.to_be_bytes(), id)
}

/// Extracts the big-endian time component from a time-ordered queue key.
pub fn time_component(key: &[u8]) -> Option<u64> {
    let bytes = key.get(1..9)?;
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}
