//! The ML model registry: model records, update proposals and the per-type
//! active-version singleton.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of model purposes.
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Hash,
)]
pub enum ModelType {
    /// Face matching between selfie and document portrait.
    FaceRecognition,
    /// Document tamper and authenticity detection.
    DocumentAuthenticity,
    /// Liveness detection over face video.
    Liveness,
    /// OCR / structured text extraction.
    TextExtraction,
    /// Aggregate risk scoring.
    RiskScoring,
    /// Feature embedding for derived features.
    FeatureEmbedding,
}

impl ModelType {
    /// Stable single-byte discriminant used inside composite keys.
    pub fn key_byte(&self) -> u8 {
        match self {
            ModelType::FaceRecognition => 0x01,
            ModelType::DocumentAuthenticity => 0x02,
            ModelType::Liveness => 0x03,
            ModelType::TextExtraction => 0x04,
            ModelType::RiskScoring => 0x05,
            ModelType::FeatureEmbedding => 0x06,
        }
    }
}

/// Registry status of a model.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ModelStatus {
    /// Registered, not yet activated.
    Pending,
    /// The one active model for its type.
    Active,
    /// Superseded by a newer activation.
    Deprecated,
    /// Withdrawn by governance; never activatable again.
    Revoked,
}

/// A registered ML model binary, identified by its SHA-256.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct MlModelInfo {
    /// Unique model id.
    pub model_id: String,
    /// The purpose this model serves.
    pub model_type: ModelType,
    /// Human-readable version string.
    pub version: String,
    /// SHA-256 of the model artifact. The canonical hash validators must match.
    pub sha256_hash: [u8; 32],
    /// Registry status. At most one Active model per type at any height.
    pub status: ModelStatus,
    /// The registering account.
    pub registered_by: AccountId,
    /// Optional governance proposal reference.
    pub governance_id: Option<String>,
    /// Block time of registration.
    pub registered_at: u64,
    /// Height of activation, if activated.
    pub activated_at: Option<u64>,
}

/// Proposal lifecycle status.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProposalStatus {
    /// Submitted, awaiting governance approval.
    Pending,
    /// Approved; activates at `activation_height`.
    Approved,
    /// Activation applied.
    Activated,
    /// Denied by governance.
    Rejected,
}

/// A proposal to switch a model type to a new model. At most one Pending
/// proposal per type.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModelUpdateProposal {
    /// The model type being updated.
    pub model_type: ModelType,
    /// The model to activate.
    pub model_id: String,
    /// The proposing account.
    pub proposed_by: AccountId,
    /// Height of submission.
    pub created_at_height: u64,
    /// Lifecycle status.
    pub status: ProposalStatus,
    /// Set on approval: current height + activation delay.
    pub activation_height: Option<u64>,
}

/// Singleton mapping each model type to its currently active model id.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct ModelVersionState {
    /// Active model id per type.
    pub active: BTreeMap<ModelType, String>,
}

/// One activation event, keyed by (type, height) in state.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModelVersionHistoryEntry {
    /// The model type that switched.
    pub model_type: ModelType,
    /// The newly active model.
    pub model_id: String,
    /// Its version string.
    pub version: String,
    /// Activation height.
    pub height: u64,
    /// Activation block time.
    pub time: u64,
}
