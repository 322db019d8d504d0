//! Delegation state-machine scenarios.

mod common;

use common::*;
use std::collections::BTreeSet;
use veid_api::events::EventSink;
use veid_services::delegation::{
    CreateDelegationParams, RevokeDelegationParams, UseDelegationParams,
};
use veid_test_utils::TestSigner;
use veid_types::app::DelegationStatus;
use veid_types::error::IdentityError;

fn permissions(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn create(
    h: &mut Harness,
    delegator: &TestSigner,
    delegate: &TestSigner,
    expires_at: u64,
    max_uses: u32,
    height: u64,
) -> String {
    let mut sink = EventSink::new();
    h.module
        .create_delegation(
            &mut h.state,
            CreateDelegationParams {
                delegate: delegate.account,
                permissions: permissions(&["prove_tier", "share_score"]),
                expires_at,
                max_uses,
            },
            &ctx_at(height, delegator.account),
            &mut sink,
        )
        .expect("create delegation")
        .delegation_id
}

#[test]
fn use_decrements_and_exhausts() {
    let mut h = setup();
    let delegator = TestSigner::new(USER_SEED);
    let delegate = TestSigner::new(0x11);
    create_wallet(&mut h, &delegator, 1);

    let expires = ctx_at(2, delegator.account).block_time + 10_000;
    let id = create(&mut h, &delegator, &delegate, expires, 2, 2);

    let mut sink = EventSink::new();
    let first = h
        .module
        .use_delegation(
            &mut h.state,
            UseDelegationParams {
                delegation_id: id.clone(),
                permission: "prove_tier".into(),
            },
            &ctx_at(3, delegate.account),
            &mut sink,
        )
        .unwrap();
    assert_eq!(first.uses_remaining, 1);

    let second = h
        .module
        .use_delegation(
            &mut h.state,
            UseDelegationParams {
                delegation_id: id.clone(),
                permission: "share_score".into(),
            },
            &ctx_at(4, delegate.account),
            &mut sink,
        )
        .unwrap();
    assert_eq!(second.uses_remaining, 0);

    let records = h
        .module
        .query_delegations_by_delegator(&h.state, &delegator.account)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DelegationStatus::Exhausted);
    assert!(records[0].uses_remaining <= records[0].max_uses);

    // An exhausted delegation refuses further use.
    let err = h
        .module
        .use_delegation(
            &mut h.state,
            UseDelegationParams {
                delegation_id: id,
                permission: "prove_tier".into(),
            },
            &ctx_at(5, delegate.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Precondition(_)));
}

#[test]
fn only_the_delegate_may_use_and_only_granted_permissions() {
    let mut h = setup();
    let delegator = TestSigner::new(USER_SEED);
    let delegate = TestSigner::new(0x11);
    create_wallet(&mut h, &delegator, 1);
    let expires = ctx_at(2, delegator.account).block_time + 10_000;
    let id = create(&mut h, &delegator, &delegate, expires, 5, 2);

    let mut sink = EventSink::new();
    let err = h
        .module
        .use_delegation(
            &mut h.state,
            UseDelegationParams {
                delegation_id: id.clone(),
                permission: "prove_tier".into(),
            },
            &ctx_at(3, delegator.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Unauthorized(_)));

    let err = h
        .module
        .use_delegation(
            &mut h.state,
            UseDelegationParams {
                delegation_id: id,
                permission: "transfer_funds".into(),
            },
            &ctx_at(3, delegate.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Unauthorized(_)));
}

#[test]
fn expiry_sweep_stops_at_first_unexpired_entry() {
    let mut h = setup();
    let delegator = TestSigner::new(USER_SEED);
    let delegate = TestSigner::new(0x11);
    create_wallet(&mut h, &delegator, 1);

    let base_time = ctx_at(2, delegator.account).block_time;
    let short = create(&mut h, &delegator, &delegate, base_time + 60, 3, 2);
    let long = create(&mut h, &delegator, &delegate, base_time + 1_000_000, 3, 3);

    // Sweep at a time past the first expiry but before the second.
    let sweep_height = 2 + 120 / 6;
    let mut sink = EventSink::new();
    h.module.expire_delegations(
        &mut h.state,
        &ctx_at(sweep_height, h.authority.account),
        &mut sink,
    );

    let records = h
        .module
        .query_delegations_by_delegator(&h.state, &delegator.account)
        .unwrap();
    let short_record = records.iter().find(|r| r.delegation_id == short).unwrap();
    let long_record = records.iter().find(|r| r.delegation_id == long).unwrap();
    assert_eq!(short_record.status, DelegationStatus::Expired);
    assert_eq!(long_record.status, DelegationStatus::Active);
}

#[test]
fn revocation_is_delegator_only_and_final() {
    let mut h = setup();
    let delegator = TestSigner::new(USER_SEED);
    let delegate = TestSigner::new(0x11);
    create_wallet(&mut h, &delegator, 1);
    let expires = ctx_at(2, delegator.account).block_time + 10_000;
    let id = create(&mut h, &delegator, &delegate, expires, 5, 2);

    let mut sink = EventSink::new();
    let err = h
        .module
        .revoke_delegation(
            &mut h.state,
            RevokeDelegationParams {
                delegation_id: id.clone(),
                reason: "no longer needed".into(),
            },
            &ctx_at(3, delegate.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Unauthorized(_)));

    h.module
        .revoke_delegation(
            &mut h.state,
            RevokeDelegationParams {
                delegation_id: id.clone(),
                reason: "no longer needed".into(),
            },
            &ctx_at(3, delegator.account),
            &mut sink,
        )
        .unwrap();

    let err = h
        .module
        .use_delegation(
            &mut h.state,
            UseDelegationParams {
                delegation_id: id,
                permission: "prove_tier".into(),
            },
            &ctx_at(4, delegate.account),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Precondition(_)));
}

#[test]
fn invalid_creations_are_rejected() {
    let mut h = setup();
    let delegator = TestSigner::new(USER_SEED);
    create_wallet(&mut h, &delegator, 1);
    let ctx = ctx_at(2, delegator.account);
    let mut sink = EventSink::new();

    // Self-delegation.
    let err = h
        .module
        .create_delegation(
            &mut h.state,
            CreateDelegationParams {
                delegate: delegator.account,
                permissions: permissions(&["prove_tier"]),
                expires_at: ctx.block_time + 100,
                max_uses: 1,
            },
            &ctx,
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidParameter(_)));

    // Empty permission set.
    let err = h
        .module
        .create_delegation(
            &mut h.state,
            CreateDelegationParams {
                delegate: TestSigner::new(0x11).account,
                permissions: BTreeSet::new(),
                expires_at: ctx.block_time + 100,
                max_uses: 1,
            },
            &ctx,
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidParameter(_)));

    // Expiry in the past.
    let err = h
        .module
        .create_delegation(
            &mut h.state,
            CreateDelegationParams {
                delegate: TestSigner::new(0x11).account,
                permissions: permissions(&["prove_tier"]),
                expires_at: ctx.block_time,
                max_uses: 1,
            },
            &ctx,
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidParameter(_)));
}
