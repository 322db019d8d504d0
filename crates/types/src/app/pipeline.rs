//! Pipeline versions and execution records used for cross-replica output
//! reconciliation.

use super::identity::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Pipeline version lifecycle status.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum PipelineStatus {
    /// Registered, not active.
    Pending,
    /// The one active pipeline version.
    Active,
    /// Superseded.
    Deprecated,
}

/// One model entry of a pipeline's manifest.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ModelManifestEntry {
    /// Model name.
    pub name: String,
    /// Model version string.
    pub version: String,
    /// SHA-256 of the model weights.
    pub weights_hash: [u8; 32],
    /// Inference framework identifier.
    pub framework: String,
    /// The purpose the model serves inside the pipeline.
    pub purpose: String,
}

/// A pinned (container image, model manifest) tuple every validator must use.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct PipelineVersion {
    /// Version string; the primary key.
    pub version: String,
    /// SHA-256 of the container image.
    pub image_hash: [u8; 32],
    /// Pullable image reference.
    pub image_ref: String,
    /// The ordered model manifest.
    pub model_manifest: Vec<ModelManifestEntry>,
    /// Hash of the canonical encoding of the manifest.
    pub manifest_hash: [u8; 32],
    /// Lifecycle status. At most one Active version.
    pub status: PipelineStatus,
    /// Block time of registration.
    pub registered_at: u64,
    /// Height of activation, if activated.
    pub activated_at: Option<u64>,
}

/// The deterministic fingerprint of one pipeline run, stored both by
/// request id and by (validator, request id).
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct PipelineExecutionRecord {
    /// The request this execution served.
    pub request_id: String,
    /// The validator that ran the pipeline.
    pub validator: AccountId,
    /// Pipeline version string at execution time.
    pub pipeline_version: String,
    /// Container image hash at execution time.
    pub image_hash: [u8; 32],
    /// Model manifest hash at execution time.
    pub model_manifest_hash: [u8; 32],
    /// Deterministic hash of the pipeline input.
    pub input_hash: [u8; 32],
    /// Deterministic hash of the pipeline output.
    pub output_hash: [u8; 32],
    /// Wall duration of the run, in milliseconds. Informational only.
    pub execution_duration_ms: u64,
    /// Whether the worker self-verified determinism before reporting.
    pub determinism_verified: bool,
    /// Block time at which the record was accepted.
    pub block_time: u64,
}

/// The result of comparing two execution records.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ExecutionComparison {
    /// True iff all compared fields are byte-equal.
    pub matches: bool,
    /// Names of the fields that differ, for audit and event emission.
    pub differences: Vec<String>,
}

impl PipelineExecutionRecord {
    /// Compares two records on the consensus-relevant fields. A mismatch is
    /// treated as Byzantine behavior by a higher layer.
    pub fn compare(a: &PipelineExecutionRecord, b: &PipelineExecutionRecord) -> ExecutionComparison {
        let mut differences = Vec::new();
        if a.pipeline_version != b.pipeline_version {
            differences.push("pipeline_version".to_string());
        }
        if a.image_hash != b.image_hash {
            differences.push("image_hash".to_string());
        }
        if a.model_manifest_hash != b.model_manifest_hash {
            differences.push("model_manifest_hash".to_string());
        }
        if a.input_hash != b.input_hash {
            differences.push("input_hash".to_string());
        }
        if a.output_hash != b.output_hash {
            differences.push("output_hash".to_string());
        }
        ExecutionComparison {
            matches: differences.is_empty(),
            differences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(output: [u8; 32]) -> PipelineExecutionRecord {
        PipelineExecutionRecord {
            request_id: "req-1".into(),
            validator: AccountId([1; 32]),
            pipeline_version: "1.4.0".into(),
            image_hash: [2; 32],
            model_manifest_hash: [3; 32],
            input_hash: [4; 32],
            output_hash: output,
            execution_duration_ms: 840,
            determinism_verified: true,
            block_time: 1_700_000_000,
        }
    }

    #[test]
    fn comparison_is_reflexive() {
        let e = record([5; 32]);
        let cmp = PipelineExecutionRecord::compare(&e, &e);
        assert!(cmp.matches);
        assert!(cmp.differences.is_empty());
    }

    #[test]
    fn output_divergence_is_named() {
        let a = record([5; 32]);
        let b = record([6; 32]);
        let cmp = PipelineExecutionRecord::compare(&a, &b);
        assert!(!cmp.matches);
        assert_eq!(cmp.differences, vec!["output_hash".to_string()]);
        // Symmetric.
        let rev = PipelineExecutionRecord::compare(&b, &a);
        assert_eq!(cmp, rev);
    }
}
