//! Wallet lifecycle, scope verification and borderline fallback scenarios.

mod common;

use common::*;
use veid_api::events::EventSink;
use veid_services::fallback::FallbackCompletedParams;
use veid_services::scope::{
    RevokeScopeParams, UploadScopeParams, VerificationOutcome,
};
use veid_services::wallet::{CreateWalletParams, RebindWalletParams};
use veid_test_utils::TestSigner;
use veid_types::app::{
    binding_message, sha256, wallet_id_for_account, ChallengeStatus, FallbackStatus, ScopeStatus,
    ScopeType, ScoreStatus, Tier,
};
use veid_types::codec;
use veid_types::error::IdentityError;

#[test]
fn wallet_creation_is_once_per_account_and_signature_checked() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);

    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.wallet_id, wallet_id_for_account(&user.account));
    assert_eq!(wallet.tier, Tier::Unverified);
    assert_eq!(wallet.score_status, ScoreStatus::Unknown);

    // Second creation fails.
    let wallet_id = wallet_id_for_account(&user.account);
    let message = binding_message(&wallet_id, &user.account);
    let mut sink = EventSink::new();
    let err = h
        .module
        .create_wallet(
            &mut h.state,
            CreateWalletParams {
                binding_public_key: user.public_key(),
                binding_signature: user.sign(&message),
            },
            &ctx_at(2, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::AlreadyExists { .. }));

    // A signature by the wrong key is refused.
    let other = TestSigner::new(0x77);
    let err = h
        .module
        .create_wallet(
            &mut h.state,
            CreateWalletParams {
                binding_public_key: other.public_key(),
                binding_signature: user.sign(&message),
            },
            &ctx_at(2, other.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidSignature(_)));
}

#[test]
fn rebind_replaces_the_binding_key_atomically() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);

    let new_key = TestSigner::new(0x55);
    let wallet_id = wallet_id_for_account(&user.account);
    let message = binding_message(&wallet_id, &user.account);
    let mut sink = EventSink::new();
    h.module
        .rebind_wallet(
            &mut h.state,
            RebindWalletParams {
                new_public_key: new_key.public_key(),
                new_key_signature: user.sign(&new_key.public_key()),
                new_binding_signature: new_key.sign(&message),
            },
            &ctx_at(2, user.account),
            &mut sink,
        )
        .unwrap();

    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.binding_public_key, new_key.public_key());

    // Uploads must now be signed by the new key.
    let salt = vec![0x5A; 32];
    let payload = b"post-rebind".to_vec();
    let payload_hash = sha256(&payload).to_vec();
    let err = h
        .module
        .upload_scope(
            &mut h.state,
            UploadScopeParams {
                scope_type: ScopeType::Selfie,
                encrypted_payload: payload,
                salt_hash: sha256(&salt),
                salt: salt.clone(),
                device_fingerprint: "device-1".into(),
                client_signature: Vec::new(),
                user_signature: user.sign(&payload_hash),
                payload_hash: payload_hash.clone(),
            },
            &ctx_at(3, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidSignature(_)));
}

#[test]
fn upload_validates_salt_and_quotas() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);
    let mut sink = EventSink::new();

    let upload = |salt: Vec<u8>, salt_hash: [u8; 32], payload: Vec<u8>, signer: &TestSigner| {
        let payload_hash = sha256(&payload).to_vec();
        UploadScopeParams {
            scope_type: ScopeType::Selfie,
            encrypted_payload: payload,
            salt_hash,
            salt,
            device_fingerprint: "device-1".into(),
            client_signature: Vec::new(),
            user_signature: signer.sign(&payload_hash),
            payload_hash,
        }
    };

    // Salt too short.
    let short_salt = vec![1u8; 4];
    let err = h
        .module
        .upload_scope(
            &mut h.state,
            upload(short_salt.clone(), sha256(&short_salt), b"p1".to_vec(), &user),
            &ctx_at(2, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidParameter(_)));

    // Salt hash mismatch.
    let salt = vec![1u8; 32];
    let err = h
        .module
        .upload_scope(
            &mut h.state,
            upload(salt, [0xFF; 32], b"p2".to_vec(), &user),
            &ctx_at(2, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::HashMismatch { .. }));

    // Per-type quota: the default allows three Selfies.
    for i in 0..3u8 {
        let salt = vec![i + 10; 32];
        h.module
            .upload_scope(
                &mut h.state,
                upload(salt.clone(), sha256(&salt), format!("p-{}", i).into_bytes(), &user),
                &ctx_at(3 + i as u64, user.account),
                &mut sink,
            )
            .unwrap();
    }
    let salt = vec![99u8; 32];
    let err = h
        .module
        .upload_scope(
            &mut h.state,
            upload(salt.clone(), sha256(&salt), b"p-last".to_vec(), &user),
            &ctx_at(9, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::QuotaExceeded(_)));
}

#[test]
fn verification_transitions_are_gated() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);
    let scope_id = upload_and_add(&mut h, &user, ScopeType::Selfie, 2);

    // A second RequestVerification on an InProgress scope is refused.
    let mut sink = EventSink::new();
    let err = h
        .module
        .request_verification(
            &mut h.state,
            veid_services::scope::RequestVerificationParams {
                scope_id: scope_id.clone(),
            },
            &ctx_at(3, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Precondition(_)));

    // Only the authority or a bonded validator may report outcomes.
    let err = h
        .module
        .update_verification_status(
            &mut h.state,
            veid_services::scope::UpdateVerificationStatusParams {
                scope_id: scope_id.clone(),
                outcome: VerificationOutcome::Verified,
                challenge_id: None,
            },
            &ctx_at(3, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Unauthorized(_)));

    decide(&mut h, &scope_id, VerificationOutcome::Verified, None, 4);
    let scope = h.module.query_scope(&h.state, &scope_id).unwrap().unwrap();
    assert_eq!(scope.status, ScopeStatus::Verified);
    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.current_score, 15);
    assert_eq!(wallet.score_status, ScoreStatus::Verified);
}

#[test]
fn revoking_a_verified_scope_drops_the_composite() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);

    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.tier, Tier::Standard);
    let id_document_ref = wallet
        .scope_refs
        .iter()
        .find(|r| r.scope_type == ScopeType::IdDocument)
        .unwrap()
        .scope_id
        .clone();

    let mut sink = EventSink::new();
    h.module
        .revoke_scope(
            &mut h.state,
            RevokeScopeParams {
                scope_id: id_document_ref.clone(),
                reason: "document reported stolen".into(),
            },
            &ctx_at(30, user.account),
            &mut sink,
        )
        .unwrap();

    let scope = h.module.query_scope(&h.state, &id_document_ref).unwrap().unwrap();
    assert!(scope.revoked);
    // The prior status is preserved for audit.
    assert_eq!(scope.status, ScopeStatus::Verified);

    // 70 − 25 = 45: below Basic.
    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.current_score, 45);
    assert_eq!(wallet.tier, Tier::Unverified);
}

#[test]
fn undecided_scopes_expire_after_the_window() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);
    let scope_id = upload_and_add(&mut h, &user, ScopeType::Selfie, 2);

    // 14 days at 6 s blocks, plus slack.
    let past_window = 2 + (14 * 24 * 3600) / 6 + 2;
    let mut sink = EventSink::new();
    h.module
        .expire_stale_scopes(&mut h.state, &ctx_at(past_window, h.authority.account), &mut sink);

    let scope = h.module.query_scope(&h.state, &scope_id).unwrap().unwrap();
    assert_eq!(scope.status, ScopeStatus::Expired);
}

#[test]
fn borderline_verification_defers_to_mfa_and_commits_on_success() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);
    // Selfie 15 + FaceVideo 20 + IdDocument 25 = 60, then EmailProof lands
    // the composite at exactly 70: inside the borderline band.
    for (i, ty) in [ScopeType::Selfie, ScopeType::FaceVideo, ScopeType::IdDocument]
        .into_iter()
        .enumerate()
    {
        upload_and_decide(&mut h, &user, ty, VerificationOutcome::Verified, 2 + i as u64 * 2);
    }
    let final_scope = upload_and_add(&mut h, &user, ScopeType::EmailProof, 10);
    let response = decide(
        &mut h,
        &final_scope,
        VerificationOutcome::Verified,
        Some("ch-1".into()),
        11,
    );
    let fallback_id = response.fallback_id.expect("borderline fallback created");

    // The score is parked: Pending status, tier not yet upgraded.
    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.current_score, 70);
    assert_eq!(wallet.score_status, ScoreStatus::Pending);
    assert_eq!(wallet.tier, Tier::Unverified);

    // MFA verifies with enough factors: the parked score commits.
    h.oracle.set_status("ch-1", ChallengeStatus::Verified);
    let mut sink = EventSink::new();
    let completed = h
        .module
        .handle_borderline_fallback_completed(
            &mut h.state,
            FallbackCompletedParams {
                challenge_id: "ch-1".into(),
                factors_satisfied: vec!["totp".into(), "webauthn".into()],
            },
            &ctx_at(12, user.account),
            &mut sink,
        )
        .unwrap();
    assert_eq!(completed.status, FallbackStatus::Completed);
    assert_eq!(completed.score, Some(70));

    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.score_status, ScoreStatus::Verified);
    assert_eq!(wallet.tier, Tier::Standard);

    let record = h.module.query_fallback(&h.state, &fallback_id).unwrap().unwrap();
    assert_eq!(record.status, FallbackStatus::Completed);
    assert_eq!(record.factors_satisfied.len(), 2);
}

#[test]
fn borderline_fallback_fails_on_insufficient_factors() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);
    for (i, ty) in [ScopeType::Selfie, ScopeType::FaceVideo, ScopeType::IdDocument]
        .into_iter()
        .enumerate()
    {
        upload_and_decide(&mut h, &user, ty, VerificationOutcome::Verified, 2 + i as u64 * 2);
    }
    let final_scope = upload_and_add(&mut h, &user, ScopeType::EmailProof, 10);
    decide(
        &mut h,
        &final_scope,
        VerificationOutcome::Verified,
        Some("ch-2".into()),
        11,
    );

    h.oracle.set_status("ch-2", ChallengeStatus::Verified);
    let mut sink = EventSink::new();
    let completed = h
        .module
        .handle_borderline_fallback_completed(
            &mut h.state,
            FallbackCompletedParams {
                challenge_id: "ch-2".into(),
                factors_satisfied: vec!["totp".into()],
            },
            &ctx_at(12, user.account),
            &mut sink,
        )
        .unwrap();
    assert_eq!(completed.status, FallbackStatus::Failed);
    assert_eq!(completed.score, None);

    // The parked score stays unverified.
    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.score_status, ScoreStatus::Pending);
    assert_eq!(wallet.tier, Tier::Unverified);
}

#[test]
fn pending_fallbacks_expire_in_the_sweep() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &user, 1);
    for (i, ty) in [ScopeType::Selfie, ScopeType::FaceVideo, ScopeType::IdDocument]
        .into_iter()
        .enumerate()
    {
        upload_and_decide(&mut h, &user, ty, VerificationOutcome::Verified, 2 + i as u64 * 2);
    }
    let final_scope = upload_and_add(&mut h, &user, ScopeType::EmailProof, 10);
    let response = decide(
        &mut h,
        &final_scope,
        VerificationOutcome::Verified,
        Some("ch-3".into()),
        11,
    );
    let fallback_id = response.fallback_id.unwrap();

    // One day plus slack.
    let past_expiry = 11 + (24 * 3600) / 6 + 2;
    let mut sink = EventSink::new();
    h.module.expire_borderline_fallbacks(
        &mut h.state,
        &ctx_at(past_expiry, h.authority.account),
        &mut sink,
    );

    let record = h.module.query_fallback(&h.state, &fallback_id).unwrap().unwrap();
    assert_eq!(record.status, FallbackStatus::Expired);

    // A late completion is refused.
    h.oracle.set_status("ch-3", ChallengeStatus::Verified);
    let err = h
        .module
        .handle_borderline_fallback_completed(
            &mut h.state,
            FallbackCompletedParams {
                challenge_id: "ch-3".into(),
                factors_satisfied: vec!["totp".into(), "webauthn".into()],
            },
            &ctx_at(past_expiry + 1, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Precondition(_)));
}

#[test]
fn persisted_entities_roundtrip_through_the_canonical_codec() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);

    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    let bytes = codec::to_bytes_canonical(&wallet);
    let decoded: veid_types::app::Wallet = codec::from_bytes_canonical(&bytes).unwrap();
    assert_eq!(wallet, decoded);

    let scope_id = &wallet.scope_refs[0].scope_id;
    let scope = h.module.query_scope(&h.state, scope_id).unwrap().unwrap();
    let bytes = codec::to_bytes_canonical(&scope);
    let decoded: veid_types::app::IdentityScope = codec::from_bytes_canonical(&bytes).unwrap();
    assert_eq!(scope, decoded);
}
