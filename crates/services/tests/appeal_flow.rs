//! Appeal state-machine scenarios.

mod common;

use common::*;
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_services::appeal::{ClaimAppealParams, ResolveAppealParams, SubmitAppealParams, WithdrawAppealParams};
use veid_services::scope::VerificationOutcome;
use veid_test_utils::TestSigner;
use veid_types::app::{
    AppealResolution, AppealStatus, IdentityEvent, ScopeStatus, ScopeType, Tier,
};
use veid_types::error::IdentityError;
use veid_types::keys;

fn long_reason() -> String {
    "The rejected document is a legitimate national identity card; the rejection appears to stem \
     from a glare artifact on the laminate that the capture device introduced."
        .to_string()
}

fn submit(
    h: &mut Harness,
    signer: &TestSigner,
    scope_id: &str,
    height: u64,
) -> Result<veid_services::appeal::SubmitAppealResponse, IdentityError> {
    let mut sink = EventSink::new();
    h.module.submit_appeal(
        &mut h.state,
        SubmitAppealParams {
            scope_id: scope_id.to_string(),
            reason: long_reason(),
            evidence_hashes: vec![[0xE1; 32]],
        },
        &ctx_at(height, signer.account),
        &mut sink,
    )
}

#[test]
fn appeal_happy_path_adjusts_score_and_tier() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);

    let scope_id = upload_and_decide(
        &mut h,
        &user,
        ScopeType::PhoneProof,
        VerificationOutcome::Rejected,
        20,
    );
    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.current_score, 70);
    assert_eq!(wallet.tier, Tier::Standard);

    let response = submit(&mut h, &user, &scope_id, 25).unwrap();
    assert_eq!(response.appeal_number, 1);

    let mut sink = EventSink::new();
    let authority = h.authority.account;
    let resolved = h
        .module
        .resolve_appeal(
            &mut h.state,
            ResolveAppealParams {
                appeal_id: response.appeal_id.clone(),
                resolution: AppealResolution::Approved,
                notes: Some("glare artifact confirmed".into()),
                score_adjustment: 15,
            },
            &ctx_at(30, authority),
            &mut sink,
        )
        .unwrap();
    assert_eq!(resolved.new_score, Some(85));

    let appeal = h.module.query_appeal(&h.state, &response.appeal_id).unwrap().unwrap();
    assert_eq!(appeal.status, AppealStatus::Approved);

    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.current_score, 85);
    assert_eq!(wallet.tier, Tier::Premium);

    let scope = h.module.query_scope(&h.state, &scope_id).unwrap().unwrap();
    assert_eq!(scope.status, ScopeStatus::Verified);

    let events = sink.events();
    let resolved_events = events
        .iter()
        .filter(|e| matches!(e, IdentityEvent::AppealResolved { .. }))
        .count();
    let tier_events = events
        .iter()
        .filter(|e| matches!(e, IdentityEvent::TierChanged { .. }))
        .count();
    assert_eq!(resolved_events, 1);
    assert_eq!(tier_events, 1);
}

#[test]
fn appeal_adjustment_clamps_at_100() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);

    // First appeal lifts the wallet to 95.
    let first = upload_and_decide(
        &mut h,
        &user,
        ScopeType::PhoneProof,
        VerificationOutcome::Rejected,
        20,
    );
    let first_appeal = submit(&mut h, &user, &first, 25).unwrap();
    let mut sink = EventSink::new();
    let authority = h.authority.account;
    h.module
        .resolve_appeal(
            &mut h.state,
            ResolveAppealParams {
                appeal_id: first_appeal.appeal_id,
                resolution: AppealResolution::Approved,
                notes: None,
                score_adjustment: 25,
            },
            &ctx_at(30, authority),
            &mut sink,
        )
        .unwrap();
    assert_eq!(
        h.module.query_wallet(&h.state, &user.account).unwrap().unwrap().current_score,
        95
    );

    // The second adjustment would overshoot; it clamps to 100.
    let second = upload_and_decide(
        &mut h,
        &user,
        ScopeType::AddressProof,
        VerificationOutcome::Rejected,
        40,
    );
    let second_appeal = submit(&mut h, &user, &second, 45).unwrap();
    let mut sink = EventSink::new();
    h.module
        .resolve_appeal(
            &mut h.state,
            ResolveAppealParams {
                appeal_id: second_appeal.appeal_id.clone(),
                resolution: AppealResolution::Approved,
                notes: None,
                score_adjustment: 20,
            },
            &ctx_at(50, authority),
            &mut sink,
        )
        .unwrap();

    let wallet = h.module.query_wallet(&h.state, &user.account).unwrap().unwrap();
    assert_eq!(wallet.current_score, 100);

    let adjusted: Vec<_> = sink
        .events()
        .iter()
        .filter_map(|e| match e {
            IdentityEvent::AppealScoreAdjusted { new_score, .. } => Some(*new_score),
            _ => None,
        })
        .collect();
    assert_eq!(adjusted, vec![100]);

    // The reverse-ordered index surfaces the most recent appeal first.
    let latest = h
        .module
        .query_latest_appeal_by_account(&h.state, &user.account)
        .unwrap()
        .unwrap();
    assert_eq!(latest.appeal_id, second_appeal.appeal_id);
}

#[test]
fn duplicate_appeal_is_rejected_and_state_unchanged() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);

    let scope_id = upload_and_decide(
        &mut h,
        &user,
        ScopeType::PhoneProof,
        VerificationOutcome::Rejected,
        20,
    );
    let first = submit(&mut h, &user, &scope_id, 25).unwrap();

    let err = submit(&mut h, &user, &scope_id, 26).unwrap_err();
    assert!(matches!(err, IdentityError::AlreadyExists { .. }));

    // The first appeal is untouched and still the only queue entry.
    let appeal = h.module.query_appeal(&h.state, &first.appeal_id).unwrap().unwrap();
    assert_eq!(appeal.status, AppealStatus::Pending);
    let queue: Vec<_> = h
        .state
        .prefix_scan(&[keys::PENDING_APPEAL_PREFIX])
        .unwrap()
        .collect();
    assert_eq!(queue.len(), 1);
}

#[test]
fn pending_queue_tracks_appeal_status() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);
    let scope_id = upload_and_decide(
        &mut h,
        &user,
        ScopeType::PhoneProof,
        VerificationOutcome::Rejected,
        20,
    );
    let response = submit(&mut h, &user, &scope_id, 25).unwrap();

    // Pending: exactly one queue entry.
    assert_eq!(
        h.state.prefix_scan(&[keys::PENDING_APPEAL_PREFIX]).unwrap().count(),
        1
    );

    let reviewer = h.validators[0].account;
    let mut sink = EventSink::new();
    h.module
        .claim_appeal(
            &mut h.state,
            ClaimAppealParams {
                appeal_id: response.appeal_id.clone(),
            },
            &ctx_at(26, reviewer),
            &mut sink,
        )
        .unwrap();

    // Reviewing: zero queue entries.
    assert_eq!(
        h.state.prefix_scan(&[keys::PENDING_APPEAL_PREFIX]).unwrap().count(),
        0
    );

    // A second claim fails and leaves the appeal with its reviewer.
    let other = h.validators[1].account;
    let err = h
        .module
        .claim_appeal(
            &mut h.state,
            ClaimAppealParams {
                appeal_id: response.appeal_id.clone(),
            },
            &ctx_at(27, other),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Precondition(_)));
    let appeal = h.module.query_appeal(&h.state, &response.appeal_id).unwrap().unwrap();
    assert_eq!(appeal.status, AppealStatus::Reviewing);
    assert_eq!(appeal.reviewer, Some(reviewer));
}

#[test]
fn stale_claims_are_released_back_to_pending() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);
    let scope_id = upload_and_decide(
        &mut h,
        &user,
        ScopeType::PhoneProof,
        VerificationOutcome::Rejected,
        20,
    );
    let response = submit(&mut h, &user, &scope_id, 25).unwrap();

    let reviewer = h.validators[0].account;
    let mut sink = EventSink::new();
    h.module
        .claim_appeal(
            &mut h.state,
            ClaimAppealParams {
                appeal_id: response.appeal_id.clone(),
            },
            &ctx_at(26, reviewer),
            &mut sink,
        )
        .unwrap();

    // Within the timeout nothing is released.
    let released = h
        .module
        .expire_stale_appeals(&mut h.state, &ctx_at(100, h.authority.account));
    assert_eq!(released, 0);

    // Past the timeout the claim is released and the appeal re-queued.
    let past = 26 + 14_400 + 2;
    let released = h
        .module
        .expire_stale_appeals(&mut h.state, &ctx_at(past, h.authority.account));
    assert_eq!(released, 1);

    let appeal = h.module.query_appeal(&h.state, &response.appeal_id).unwrap().unwrap();
    assert_eq!(appeal.status, AppealStatus::Pending);
    assert_eq!(appeal.reviewer, None);
    assert_eq!(
        h.state.prefix_scan(&[keys::PENDING_APPEAL_PREFIX]).unwrap().count(),
        1
    );

    // The resubmitted claim works again after release.
    h.module
        .claim_appeal(
            &mut h.state,
            ClaimAppealParams {
                appeal_id: response.appeal_id,
            },
            &ctx_at(past + 1, reviewer),
            &mut sink,
        )
        .unwrap();
}

#[test]
fn only_submitter_withdraws_and_only_reviewer_resolves() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);
    let scope_id = upload_and_decide(
        &mut h,
        &user,
        ScopeType::PhoneProof,
        VerificationOutcome::Rejected,
        20,
    );
    let response = submit(&mut h, &user, &scope_id, 25).unwrap();

    let mut sink = EventSink::new();
    let reviewer = h.validators[0].account;
    h.module
        .claim_appeal(
            &mut h.state,
            ClaimAppealParams {
                appeal_id: response.appeal_id.clone(),
            },
            &ctx_at(26, reviewer),
            &mut sink,
        )
        .unwrap();

    // A different bonded validator may not resolve a claim it does not hold.
    let interloper = h.validators[1].account;
    let err = h
        .module
        .resolve_appeal(
            &mut h.state,
            ResolveAppealParams {
                appeal_id: response.appeal_id.clone(),
                resolution: AppealResolution::Rejected,
                notes: None,
                score_adjustment: 0,
            },
            &ctx_at(27, interloper),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Unauthorized(_)));

    // The authority overrides the claim.
    let authority = h.authority.account;
    h.module
        .resolve_appeal(
            &mut h.state,
            ResolveAppealParams {
                appeal_id: response.appeal_id.clone(),
                resolution: AppealResolution::Rejected,
                notes: None,
                score_adjustment: 0,
            },
            &ctx_at(28, authority),
            &mut sink,
        )
        .unwrap();

    // A terminal appeal can no longer be withdrawn.
    let err = h
        .module
        .withdraw_appeal(
            &mut h.state,
            WithdrawAppealParams {
                appeal_id: response.appeal_id,
            },
            &ctx_at(29, user.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Precondition(_)));
}

#[test]
fn appeal_window_is_measured_from_rejection_height() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    wallet_with_score_70(&mut h, &user, 1);
    let scope_id = upload_and_decide(
        &mut h,
        &user,
        ScopeType::PhoneProof,
        VerificationOutcome::Rejected,
        20,
    );

    // Far past the window (100_800 blocks) the submission is refused.
    let err = submit(&mut h, &user, &scope_id, 21 + 100_801).unwrap_err();
    assert!(matches!(err, IdentityError::Expired(_)));
}
