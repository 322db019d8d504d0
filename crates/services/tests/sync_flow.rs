//! Validator model-sync protocol scenarios.

mod common;

use common::*;
use veid_api::events::EventSink;
use veid_services::registry::RegisterModelParams;
use veid_services::sync::{
    BroadcastModelUpdateParams, ConfirmModelSyncParams, RequestModelSyncParams,
};
use veid_types::app::{IdentityEvent, ModelType, SyncStatus};
use veid_types::error::IdentityError;

const MODEL_HASH: [u8; 32] = [0xAB; 32];

fn register_model(h: &mut Harness, model_id: &str, height: u64) {
    let mut sink = EventSink::new();
    let authority = h.authority.account;
    h.module
        .register_model(
            &mut h.state,
            RegisterModelParams {
                model_id: model_id.to_string(),
                model_type: ModelType::FaceRecognition,
                version: "2.1.0".into(),
                sha256_hash: MODEL_HASH,
            },
            &ctx_at(height, authority),
            &mut sink,
        )
        .expect("register model");
}

fn broadcast(h: &mut Harness, model_id: &str, height: u64) -> u64 {
    let mut sink = EventSink::new();
    let authority = h.authority.account;
    let ctx = ctx_at(height, authority);
    h.module
        .broadcast_model_update(
            &mut h.state,
            BroadcastModelUpdateParams {
                model_id: model_id.to_string(),
                new_version: "2.1.0".into(),
                new_hash: MODEL_HASH,
            },
            &ctx,
            &mut sink,
        )
        .expect("broadcast");
    ctx.block_time
}

#[test]
fn deadline_breach_moves_unconfirmed_validators_to_error() {
    let mut h = setup();
    register_model(&mut h, "face-v2", 5);
    let broadcast_time = broadcast(&mut h, "face-v2", 6);

    // All three genesis validators are now out of sync.
    for v in &h.validators {
        let record = h.module.query_validator_sync(&h.state, &v.account).unwrap();
        assert_eq!(record.sync_status, SyncStatus::OutOfSync);
        assert_eq!(record.out_of_sync_models, vec!["face-v2".to_string()]);
        assert!(record.grace_period_expires.is_some());
    }

    // Validator 0 confirms within the grace period.
    let mut sink = EventSink::new();
    let confirming = h.validators[0].account;
    let response = h
        .module
        .confirm_model_sync(
            &mut h.state,
            ConfirmModelSyncParams {
                model_id: "face-v2".into(),
                sha256_hash: MODEL_HASH,
            },
            &ctx_at(10, confirming),
            &mut sink,
        )
        .unwrap();
    assert!(response.synced);

    // One block past the deadline, the two silent validators flip to Error.
    // Grace is 600 blocks × 6 s; pick a height safely past it.
    let past_deadline_height = (broadcast_time + 600 * 6 - 1_700_000_000) / 6 + 2;
    let mut sink = EventSink::new();
    h.module.check_sync_deadlines(
        &mut h.state,
        &ctx_at(past_deadline_height, h.authority.account),
        &mut sink,
    );

    let synced = h
        .module
        .query_validator_sync(&h.state, &h.validators[0].account)
        .unwrap();
    assert_eq!(synced.sync_status, SyncStatus::Synced);
    assert_eq!(synced.last_error, None);

    for v in &h.validators[1..] {
        let record = h.module.query_validator_sync(&h.state, &v.account).unwrap();
        assert_eq!(record.sync_status, SyncStatus::Error);
        assert_eq!(
            record.last_error.as_deref(),
            Some("sync grace period expired")
        );
    }

    let expired_events = sink
        .events()
        .iter()
        .filter(|e| matches!(e, IdentityEvent::SyncDeadlineExpired { .. }))
        .count();
    assert_eq!(expired_events, 2);
}

#[test]
fn confirmation_at_deadline_block_beats_the_deadline_check() {
    let mut h = setup();
    register_model(&mut h, "face-v2", 5);
    let broadcast_time = broadcast(&mut h, "face-v2", 6);
    let deadline_height = (broadcast_time + 600 * 6 - 1_700_000_000) / 6 + 2;

    // Within the deadline block, the message applies first...
    let mut sink = EventSink::new();
    let confirming = h.validators[0].account;
    h.module
        .confirm_model_sync(
            &mut h.state,
            ConfirmModelSyncParams {
                model_id: "face-v2".into(),
                sha256_hash: MODEL_HASH,
            },
            &ctx_at(deadline_height, confirming),
            &mut sink,
        )
        .unwrap();

    // ...and the end-of-block check spares the confirming validator.
    h.module.check_sync_deadlines(
        &mut h.state,
        &ctx_at(deadline_height, h.authority.account),
        &mut sink,
    );
    let record = h
        .module
        .query_validator_sync(&h.state, &h.validators[0].account)
        .unwrap();
    assert_eq!(record.sync_status, SyncStatus::Synced);
}

#[test]
fn hash_mismatch_is_rejected() {
    let mut h = setup();
    register_model(&mut h, "face-v2", 5);

    let mut sink = EventSink::new();
    let confirming = h.validators[0].account;
    let err = h
        .module
        .confirm_model_sync(
            &mut h.state,
            ConfirmModelSyncParams {
                model_id: "face-v2".into(),
                sha256_hash: [0xEE; 32],
            },
            &ctx_at(10, confirming),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::HashMismatch { .. }));
}

#[test]
fn confirmation_is_idempotent_for_installed_models() {
    let mut h = setup();
    register_model(&mut h, "face-v2", 5);
    broadcast(&mut h, "face-v2", 6);

    let mut sink = EventSink::new();
    let confirming = h.validators[0].account;
    let params = ConfirmModelSyncParams {
        model_id: "face-v2".into(),
        sha256_hash: MODEL_HASH,
    };
    let ctx = ctx_at(10, confirming);
    h.module
        .confirm_model_sync(&mut h.state, params.clone(), &ctx, &mut sink)
        .unwrap();
    let first = h.module.query_validator_sync(&h.state, &confirming).unwrap();

    let second_response = h
        .module
        .confirm_model_sync(&mut h.state, params, &ctx, &mut sink)
        .unwrap();
    assert!(second_response.synced);
    let second = h.module.query_validator_sync(&h.state, &confirming).unwrap();
    assert_eq!(first, second);
}

#[test]
fn sync_request_tracks_outstanding_models() {
    let mut h = setup();
    register_model(&mut h, "face-v2", 5);
    broadcast(&mut h, "face-v2", 6);

    let mut sink = EventSink::new();
    let validator = h.validators[1].account;
    let request = h
        .module
        .request_model_sync(
            &mut h.state,
            RequestModelSyncParams {
                model_ids: vec!["face-v2".into()],
            },
            &ctx_at(8, validator),
            &mut sink,
        )
        .unwrap();
    assert_eq!(request.model_ids, vec!["face-v2".to_string()]);

    let record = h.module.query_validator_sync(&h.state, &validator).unwrap();
    assert_eq!(record.sync_status, SyncStatus::Syncing);
    assert_eq!(record.sync_attempts, 1);

    // Confirming the model completes the request and resets the counter.
    h.module
        .confirm_model_sync(
            &mut h.state,
            ConfirmModelSyncParams {
                model_id: "face-v2".into(),
                sha256_hash: MODEL_HASH,
            },
            &ctx_at(9, validator),
            &mut sink,
        )
        .unwrap();
    let record = h.module.query_validator_sync(&h.state, &validator).unwrap();
    assert_eq!(record.sync_status, SyncStatus::Synced);
    assert_eq!(record.sync_attempts, 0);
}

#[test]
fn synced_iff_out_of_sync_list_empty() {
    let mut h = setup();
    register_model(&mut h, "face-v2", 5);
    broadcast(&mut h, "face-v2", 6);

    for v in &h.validators {
        let record = h.module.query_validator_sync(&h.state, &v.account).unwrap();
        assert_eq!(
            record.sync_status == SyncStatus::Synced,
            record.out_of_sync_models.is_empty()
        );
    }
}
