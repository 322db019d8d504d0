//! Router dispatch, parameter governance and lifecycle wiring.

mod common;

use common::*;
use veid_api::events::EventSink;
use veid_api::lifecycle::{OnBeginBlock, OnEndBlock};
use veid_api::services::{BlockchainService, Capabilities};
use veid_services::params::{UpdateBorderlineParamsParams, UpdateParamsParams};
use veid_services::registry::{
    ApproveModelProposalParams, ProposeModelUpdateParams, RegisterModelParams,
};
use veid_services::router::{IdentityMsg, IdentityResponse};
use veid_services::wallet::CreateWalletParams;
use veid_test_utils::TestSigner;
use veid_types::app::{binding_message, wallet_id_for_account, ModelType};
use veid_types::error::IdentityError;
use veid_types::service_configs::{BorderlineParams, VeidParams};

#[test]
fn router_dispatches_and_responses_carry_the_height() {
    let mut h = setup();
    let user = TestSigner::new(USER_SEED);
    let wallet_id = wallet_id_for_account(&user.account);
    let message = binding_message(&wallet_id, &user.account);

    let mut sink = EventSink::new();
    let response = h
        .module
        .handle(
            &mut h.state,
            IdentityMsg::CreateIdentityWallet(CreateWalletParams {
                binding_public_key: user.public_key(),
                binding_signature: user.sign(&message),
            }),
            &ctx_at(42, user.account),
            &mut sink,
        )
        .unwrap();
    match response {
        IdentityResponse::CreateIdentityWallet(r) => {
            assert_eq!(r.height, 42);
            assert_eq!(r.wallet_id, wallet_id);
        }
        other => panic!("unexpected response variant: {:?}", other),
    }
}

#[test]
fn parameter_updates_are_authority_gated_and_validated() {
    let mut h = setup();
    let mut sink = EventSink::new();

    let mut replacement = VeidParams::default();
    replacement.authority = h.authority.account;
    replacement.appeal.max_appeals_per_scope = 5;

    // A non-authority caller is refused.
    let outsider = h.user.account;
    let err = h
        .module
        .update_params(
            &mut h.state,
            UpdateParamsParams {
                params: replacement.clone(),
            },
            &ctx_at(5, outsider),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::Unauthorized(_)));

    let authority = h.authority.account;
    h.module
        .update_params(
            &mut h.state,
            UpdateParamsParams {
                params: replacement,
            },
            &ctx_at(5, authority),
            &mut sink,
        )
        .unwrap();

    // Invalid borderline parameters are refused by validation.
    let err = h
        .module
        .update_borderline_params(
            &mut h.state,
            UpdateBorderlineParamsParams {
                borderline: BorderlineParams {
                    enabled: true,
                    band_width: 90,
                    min_factors_satisfied: 2,
                    fallback_expiry_secs: 3600,
                },
            },
            &ctx_at(6, authority),
            &mut sink,
        )
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidParameter(_)));

    h.module
        .update_borderline_params(
            &mut h.state,
            UpdateBorderlineParamsParams {
                borderline: BorderlineParams {
                    enabled: false,
                    band_width: 2,
                    min_factors_satisfied: 3,
                    fallback_expiry_secs: 3600,
                },
            },
            &ctx_at(7, authority),
            &mut sink,
        )
        .unwrap();
}

#[test]
fn lifecycle_hooks_are_wired_through_the_service_trait() {
    let mut h = setup();
    assert_eq!(h.module.id(), "veid");
    assert_eq!(
        h.module.capabilities(),
        Capabilities::ON_BEGIN_BLOCK | Capabilities::ON_END_BLOCK
    );

    // Approve a model activation, then drive it purely through the trait
    // objects the host would use.
    let mut sink = EventSink::new();
    let authority = h.authority.account;
    h.module
        .register_model(
            &mut h.state,
            RegisterModelParams {
                model_id: "risk-v1".into(),
                model_type: ModelType::RiskScoring,
                version: "1.0.0".into(),
                sha256_hash: [0x09; 32],
            },
            &ctx_at(5, authority),
            &mut sink,
        )
        .unwrap();
    h.module
        .propose_model_update(
            &mut h.state,
            ProposeModelUpdateParams {
                model_type: ModelType::RiskScoring,
                model_id: "risk-v1".into(),
            },
            &ctx_at(6, authority),
            &mut sink,
        )
        .unwrap();
    let activation = h
        .module
        .approve_model_proposal(
            &mut h.state,
            ApproveModelProposalParams {
                model_type: ModelType::RiskScoring,
            },
            &ctx_at(7, authority),
            &mut sink,
        )
        .unwrap()
        .activation_height;

    let begin: &dyn OnBeginBlock = h.module.as_on_begin_block().unwrap();
    begin
        .on_begin_block(&mut h.state, &ctx_at(activation, authority), &mut sink)
        .unwrap();
    let active = h
        .module
        .query_active_model(&h.state, ModelType::RiskScoring)
        .unwrap()
        .unwrap();
    assert_eq!(active.model_id, "risk-v1");

    let end: &dyn OnEndBlock = h.module.as_on_end_block().unwrap();
    end.on_end_block(&mut h.state, &ctx_at(activation, authority), &mut sink)
        .unwrap();
}
