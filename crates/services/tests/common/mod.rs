//! Shared harness for the module's integration tests.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use veid_api::events::EventSink;
use veid_api::transaction::TxContext;
use veid_services::scope::{
    RequestVerificationParams, UpdateVerificationStatusParams, UploadScopeParams,
    VerificationOutcome,
};
use veid_services::wallet::{AddScopeParams, CreateWalletParams};
use veid_services::VeidModule;
use veid_test_utils::{test_context, MemoryState, MockMfaOracle, TestSigner};
use veid_types::app::{binding_message, sha256, wallet_id_for_account, AccountId, ScopeType};
use veid_types::service_configs::VeidParams;

pub const AUTHORITY_SEED: u8 = 0xA0;
pub const VALIDATOR_SEEDS: [u8; 3] = [0x01, 0x02, 0x03];
pub const USER_SEED: u8 = 0x10;

pub struct Harness {
    pub module: VeidModule,
    pub state: MemoryState,
    pub oracle: Arc<MockMfaOracle>,
    pub authority: TestSigner,
    pub validators: Vec<TestSigner>,
    pub user: TestSigner,
}

pub fn setup() -> Harness {
    let oracle = Arc::new(MockMfaOracle::new());
    let module = VeidModule::new(oracle.clone());
    let mut state = MemoryState::new();

    let authority = TestSigner::new(AUTHORITY_SEED);
    let validators: Vec<TestSigner> = VALIDATOR_SEEDS.iter().map(|s| TestSigner::new(*s)).collect();
    let user = TestSigner::new(USER_SEED);

    let mut params = VeidParams::default();
    params.authority = authority.account;
    let validator_set: BTreeSet<AccountId> = validators.iter().map(|v| v.account).collect();
    module
        .init_genesis(&mut state, &params, &validator_set)
        .expect("genesis");

    Harness {
        module,
        state,
        oracle,
        authority,
        validators,
        user,
    }
}

pub fn ctx_at(height: u64, signer: AccountId) -> TxContext {
    test_context(height, signer)
}

/// Creates a wallet for the signer at the given height.
pub fn create_wallet(h: &mut Harness, signer: &TestSigner, height: u64) {
    let wallet_id = wallet_id_for_account(&signer.account);
    let message = binding_message(&wallet_id, &signer.account);
    let mut sink = EventSink::new();
    h.module
        .create_wallet(
            &mut h.state,
            CreateWalletParams {
                binding_public_key: signer.public_key(),
                binding_signature: signer.sign(&message),
            },
            &ctx_at(height, signer.account),
            &mut sink,
        )
        .expect("create wallet");
}

/// Uploads a scope, references it from the wallet and requests verification,
/// leaving the scope InProgress. Returns the scope id.
pub fn upload_and_add(
    h: &mut Harness,
    signer: &TestSigner,
    scope_type: ScopeType,
    height: u64,
) -> String {
    let salt = vec![0x5A; 32];
    let payload = format!("payload-{:?}-{}", scope_type, height).into_bytes();
    let payload_hash = sha256(&payload).to_vec();
    let mut sink = EventSink::new();

    let uploaded = h
        .module
        .upload_scope(
            &mut h.state,
            UploadScopeParams {
                scope_type,
                encrypted_payload: payload,
                salt_hash: sha256(&salt),
                salt,
                device_fingerprint: "device-1".into(),
                client_signature: Vec::new(),
                user_signature: signer.sign(&payload_hash),
                payload_hash,
            },
            &ctx_at(height, signer.account),
            &mut sink,
        )
        .expect("upload scope");

    h.module
        .add_scope_to_wallet(
            &mut h.state,
            AddScopeParams {
                scope_id: uploaded.scope_id.clone(),
            },
            &ctx_at(height, signer.account),
            &mut sink,
        )
        .expect("add scope to wallet");

    h.module
        .request_verification(
            &mut h.state,
            RequestVerificationParams {
                scope_id: uploaded.scope_id.clone(),
            },
            &ctx_at(height, signer.account),
            &mut sink,
        )
        .expect("request verification");

    uploaded.scope_id
}

/// Reports a verification decision for a scope, as the authority.
pub fn decide(
    h: &mut Harness,
    scope_id: &str,
    outcome: VerificationOutcome,
    challenge_id: Option<String>,
    height: u64,
) -> veid_services::scope::UpdateVerificationStatusResponse {
    let mut sink = EventSink::new();
    let authority = h.authority.account;
    h.module
        .update_verification_status(
            &mut h.state,
            UpdateVerificationStatusParams {
                scope_id: scope_id.to_string(),
                outcome,
                challenge_id,
            },
            &ctx_at(height, authority),
            &mut sink,
        )
        .expect("update verification status")
}

/// Uploads a scope, references it from the wallet and walks it through
/// Pending → InProgress → the given outcome. Returns the scope id.
pub fn upload_and_decide(
    h: &mut Harness,
    signer: &TestSigner,
    scope_type: ScopeType,
    outcome: VerificationOutcome,
    height: u64,
) -> String {
    let scope_id = upload_and_add(h, signer, scope_type, height);
    decide(h, &scope_id, outcome, None, height + 1);
    scope_id
}

/// Builds a wallet with a verified composite score of exactly 70
/// (Selfie 15 + FaceVideo 20 + IdDocument 25 + EmailProof 10).
pub fn wallet_with_score_70(h: &mut Harness, signer: &TestSigner, start_height: u64) {
    create_wallet(h, signer, start_height);
    let mut height = start_height + 1;
    for scope_type in [
        ScopeType::Selfie,
        ScopeType::FaceVideo,
        ScopeType::IdDocument,
        ScopeType::EmailProof,
    ] {
        upload_and_decide(h, signer, scope_type, VerificationOutcome::Verified, height);
        height += 2;
    }
}
