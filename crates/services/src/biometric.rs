//! Biometric template hashing.
//!
//! Raw templates exist only inside this handler: what survives is an
//! Argon2id digest under a per-hash salt plus 16 locality-sensitive hash
//! buckets. The Argon2 parameters are pinned so every replica derives the
//! same digest.

use crate::store;
use crate::VeidModule;
use argon2::{Algorithm, Argon2, Params, Version};
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    domain_hash, sha256, BiometricTemplateHash, LSH_BUCKETS, LSH_BUCKET_BYTES,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Pinned Argon2id memory cost in KiB. Consensus-critical; never change
/// without a coordinated upgrade.
const ARGON2_MEMORY_KIB: u32 = 19_456;
/// Pinned Argon2id iteration count.
const ARGON2_ITERATIONS: u32 = 2;
/// Pinned Argon2id parallelism.
const ARGON2_LANES: u32 = 1;
/// Output digest length in bytes.
const ARGON2_OUTPUT_LEN: usize = 32;
/// Current hashing scheme version.
const HASH_SCHEME_VERSION: u32 = 1;

/// Parameters for `RegisterBiometricTemplate`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RegisterBiometricTemplateParams {
    /// Template kind, e.g. "face".
    pub template_type: String,
    /// The raw template. Never persisted.
    pub template: Vec<u8>,
    /// Match threshold in percent, carried for the caller's policy.
    pub match_threshold: u32,
}

/// Response to `RegisterBiometricTemplate`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RegisterBiometricTemplateResponse {
    /// The new hash id.
    pub hash_id: String,
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    /// Derives the memory-hard digest of (template ∥ salt).
    fn template_digest(template: &[u8], salt: &[u8; 32]) -> Result<Vec<u8>, IdentityError> {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_LANES,
            Some(ARGON2_OUTPUT_LEN),
        )
        .map_err(|e| IdentityError::InvalidParameter(format!("argon2 params: {}", e)))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut out = vec![0u8; ARGON2_OUTPUT_LEN];
        argon
            .hash_password_into(template, salt, &mut out)
            .map_err(|e| IdentityError::InvalidParameter(format!("argon2 digest: {}", e)))?;
        Ok(out)
    }

    /// Computes the 16×8-byte LSH buckets of a template.
    fn lsh_buckets(template: &[u8]) -> [[u8; LSH_BUCKET_BYTES]; LSH_BUCKETS] {
        let mut buckets = [[0u8; LSH_BUCKET_BYTES]; LSH_BUCKETS];
        for (i, bucket) in buckets.iter_mut().enumerate() {
            let mut preimage = template.to_vec();
            preimage.push(i as u8);
            let digest = sha256(&preimage);
            bucket.copy_from_slice(&digest[..LSH_BUCKET_BYTES]);
        }
        buckets
    }

    /// Handles `RegisterBiometricTemplate`.
    pub fn register_biometric_template(
        &self,
        state: &mut dyn StateAccess,
        params: RegisterBiometricTemplateParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<RegisterBiometricTemplateResponse, IdentityError> {
        let account = ctx.signer_account_id;
        self.load_active_wallet(state, &account)?;
        if params.template.is_empty() {
            return Err(IdentityError::InvalidParameter(
                "template must not be empty".into(),
            ));
        }
        if params.match_threshold > 100 {
            return Err(IdentityError::InvalidParameter(
                "match threshold must be a percentage".into(),
            ));
        }

        let hash_id = hex::encode(domain_hash(
            b"VEID-BIOMETRIC-ID::V1",
            &[
                account.as_ref(),
                params.template_type.as_bytes(),
                &ctx.block_height.to_be_bytes(),
            ],
        ));
        let primary_key = keys::key1(keys::BIOMETRIC_HASH_PREFIX, hash_id.as_bytes());
        if state.get(&primary_key)?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "biometric hash",
                id: hash_id,
            });
        }

        // Unique per hash, reproducible across replicas.
        let salt = domain_hash(b"VEID-BIOMETRIC-SALT::V1", &[account.as_ref(), hash_id.as_bytes()]);
        let hash_value = Self::template_digest(&params.template, &salt)?;
        let lsh_hashes = Self::lsh_buckets(&params.template);

        let record = BiometricTemplateHash {
            hash_id: hash_id.clone(),
            account,
            template_type: params.template_type,
            hash_value,
            salt,
            version: HASH_SCHEME_VERSION,
            match_threshold: params.match_threshold,
            lsh_hashes,
        };
        store::put_typed(state, &primary_key, &record)?;
        store::put_index(
            state,
            &keys::key2(
                keys::BIOMETRIC_BY_ACCOUNT_PREFIX,
                account.as_ref(),
                hash_id.as_bytes(),
            ),
        )?;

        log::info!("[veid] biometric template hashed for {}", account);
        Ok(RegisterBiometricTemplateResponse {
            hash_id,
            height: ctx.block_height,
        })
    }
}
