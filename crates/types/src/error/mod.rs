//! Core error types for the VEID module.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors related to the key-value state layer.
#[derive(Error, Debug)]
pub enum StateError {
    /// The requested key was not found in the state.
    #[error("Key not found in state")]
    KeyNotFound,
    /// An error occurred in the state backend.
    #[error("State backend error: {0}")]
    Backend(String),
    /// An error occurred while writing to the state.
    #[error("State write error: {0}")]
    WriteError(String),
    /// The provided value was invalid.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    /// An error occurred during state deserialization.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A secondary index pointed at a missing primary record. This indicates
    /// consensus divergence risk and is treated as fatal by callers.
    #[error("Index entry has no primary record: {0}")]
    IndexCorruption(String),
}

impl ErrorCode for StateError {
    fn code(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "STATE_KEY_NOT_FOUND",
            Self::Backend(_) => "STATE_BACKEND_ERROR",
            Self::WriteError(_) => "STATE_WRITE_ERROR",
            Self::InvalidValue(_) => "STATE_INVALID_VALUE",
            Self::Decode(_) => "STATE_DECODE_ERROR",
            Self::IndexCorruption(_) => "STATE_INDEX_CORRUPTION",
        }
    }
}

/// The error taxonomy of the VEID message surface.
///
/// Every handler returns exactly one of these kinds with a human-readable
/// detail. Handlers recover nothing: any failure aborts the message and rolls
/// back its writes.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The supplied account address is malformed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// A cryptographic signature failed verification.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind, e.g. "wallet" or "appeal".
        entity: &'static str,
        /// The offending identifier.
        id: String,
    },
    /// The entity already exists and may not be created again.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// The entity kind.
        entity: &'static str,
        /// The offending identifier.
        id: String,
    },
    /// The caller is not permitted to perform this operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// A state-machine transition was rejected.
    #[error("Precondition violation: {0}")]
    Precondition(String),
    /// A per-account or per-type quota was exceeded.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    /// A window, deadline or record has expired.
    #[error("Expired: {0}")]
    Expired(String),
    /// A supplied hash does not match the canonical hash.
    #[error("Hash mismatch: expected {expected}, got {got}")]
    HashMismatch {
        /// The canonical hash, hex-encoded.
        expected: String,
        /// The supplied hash, hex-encoded.
        got: String,
    },
    /// A message parameter failed validation.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// An error originating from the state layer.
    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl ErrorCode for IdentityError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "VEID_INVALID_ADDRESS",
            Self::InvalidSignature(_) => "VEID_INVALID_SIGNATURE",
            Self::NotFound { .. } => "VEID_NOT_FOUND",
            Self::AlreadyExists { .. } => "VEID_ALREADY_EXISTS",
            Self::Unauthorized(_) => "VEID_UNAUTHORIZED",
            Self::Precondition(_) => "VEID_PRECONDITION_VIOLATION",
            Self::QuotaExceeded(_) => "VEID_QUOTA_EXCEEDED",
            Self::Expired(_) => "VEID_EXPIRED",
            Self::HashMismatch { .. } => "VEID_HASH_MISMATCH",
            Self::InvalidParameter(_) => "VEID_INVALID_PARAMETER",
            Self::State(_) => "VEID_STATE_ERROR",
        }
    }
}

impl From<String> for IdentityError {
    fn from(s: String) -> Self {
        IdentityError::InvalidParameter(s)
    }
}
