//! The message router: a tagged variant over the closed message set of the
//! module, dispatched by an exhaustive match.

use crate::appeal::*;
use crate::biometric::*;
use crate::delegation::*;
use crate::erasure::*;
use crate::fallback::*;
use crate::params::*;
use crate::pipeline::*;
use crate::registry::*;
use crate::scope::*;
use crate::sync::*;
use crate::wallet::*;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::error::IdentityError;

/// The closed set of messages the module accepts.
#[derive(Encode, Decode, Clone, Debug)]
pub enum IdentityMsg {
    /// Create an identity wallet for the signer.
    CreateIdentityWallet(CreateWalletParams),
    /// Replace the wallet's binding key.
    RebindWallet(RebindWalletParams),
    /// Add a scope reference to the signer's wallet.
    AddScopeToWallet(AddScopeParams),
    /// Remove a scope reference from the signer's wallet.
    RevokeScopeFromWallet(RemoveScopeParams),
    /// Replace the signer's consent settings.
    UpdateConsentSettings(UpdateConsentParams),
    /// Upload a new scope.
    UploadScope(UploadScopeParams),
    /// Ask for verification of a pending scope.
    RequestVerification(RequestVerificationParams),
    /// Report a verification decision.
    UpdateVerificationStatus(UpdateVerificationStatusParams),
    /// Revoke a scope.
    RevokeScope(RevokeScopeParams),
    /// Dispute a rejected verification.
    SubmitAppeal(SubmitAppealParams),
    /// Claim a pending appeal for review.
    ClaimAppeal(ClaimAppealParams),
    /// Resolve a claimed or pending appeal.
    ResolveAppeal(ResolveAppealParams),
    /// Withdraw one's own appeal.
    WithdrawAppeal(WithdrawAppealParams),
    /// Grant a permission subset to another account.
    CreateDelegation(CreateDelegationParams),
    /// Revoke a delegation.
    RevokeDelegation(RevokeDelegationParams),
    /// Exercise a delegated permission.
    UseDelegation(UseDelegationParams),
    /// Register an ML model.
    RegisterModel(RegisterModelParams),
    /// Propose switching a model type to a registered model.
    ProposeModelUpdate(ProposeModelUpdateParams),
    /// Approve the pending proposal for a model type.
    ApproveModelProposal(ApproveModelProposalParams),
    /// Register a pipeline version.
    RegisterPipelineVersion(RegisterPipelineVersionParams),
    /// Activate a registered pipeline version.
    ActivatePipelineVersion(ActivatePipelineVersionParams),
    /// Record a deterministic pipeline execution.
    RecordPipelineExecution(RecordPipelineExecutionParams),
    /// Ask the chain to track a model installation.
    RequestModelSync(RequestModelSyncParams),
    /// Confirm a model installation against the registry hash.
    ConfirmModelSync(ConfirmModelSyncParams),
    /// Broadcast a model update to every validator.
    BroadcastModelUpdate(BroadcastModelUpdateParams),
    /// Submit a GDPR erasure request.
    SubmitErasureRequest(SubmitErasureRequestParams),
    /// Process a pending erasure request.
    ProcessErasureRequest(ProcessErasureRequestParams),
    /// Build the certificate for a processed erasure request.
    GenerateErasureCertificate(GenerateErasureCertificateParams),
    /// Replace the module parameter set.
    UpdateParams(UpdateParamsParams),
    /// Replace the borderline parameters.
    UpdateBorderlineParams(UpdateBorderlineParamsParams),
    /// Conclude a borderline MFA fallback.
    HandleBorderlineFallbackCompleted(FallbackCompletedParams),
    /// Register a biometric template hash.
    RegisterBiometricTemplate(RegisterBiometricTemplateParams),
}

/// The typed responses, one per message kind. Every response carries the
/// height at which its effect is recorded.
#[derive(Encode, Decode, Clone, Debug)]
pub enum IdentityResponse {
    /// Response to `CreateIdentityWallet`.
    CreateIdentityWallet(CreateWalletResponse),
    /// Response to `RebindWallet`.
    RebindWallet(RebindWalletResponse),
    /// Response to `AddScopeToWallet`.
    AddScopeToWallet(ScopeRefResponse),
    /// Response to `RevokeScopeFromWallet`.
    RevokeScopeFromWallet(ScopeRefResponse),
    /// Response to `UpdateConsentSettings`.
    UpdateConsentSettings(UpdateConsentResponse),
    /// Response to `UploadScope`.
    UploadScope(UploadScopeResponse),
    /// Response to `RequestVerification`.
    RequestVerification(RequestVerificationResponse),
    /// Response to `UpdateVerificationStatus`.
    UpdateVerificationStatus(UpdateVerificationStatusResponse),
    /// Response to `RevokeScope`.
    RevokeScope(RevokeScopeResponse),
    /// Response to `SubmitAppeal`.
    SubmitAppeal(SubmitAppealResponse),
    /// Response to `ClaimAppeal`.
    ClaimAppeal(ClaimAppealResponse),
    /// Response to `ResolveAppeal`.
    ResolveAppeal(ResolveAppealResponse),
    /// Response to `WithdrawAppeal`.
    WithdrawAppeal(WithdrawAppealResponse),
    /// Response to `CreateDelegation`.
    CreateDelegation(CreateDelegationResponse),
    /// Response to `RevokeDelegation`.
    RevokeDelegation(RevokeDelegationResponse),
    /// Response to `UseDelegation`.
    UseDelegation(UseDelegationResponse),
    /// Response to `RegisterModel`.
    RegisterModel(RegisterModelResponse),
    /// Response to `ProposeModelUpdate`.
    ProposeModelUpdate(ProposeModelUpdateResponse),
    /// Response to `ApproveModelProposal`.
    ApproveModelProposal(ApproveModelProposalResponse),
    /// Response to `RegisterPipelineVersion`.
    RegisterPipelineVersion(RegisterPipelineVersionResponse),
    /// Response to `ActivatePipelineVersion`.
    ActivatePipelineVersion(ActivatePipelineVersionResponse),
    /// Response to `RecordPipelineExecution`.
    RecordPipelineExecution(RecordPipelineExecutionResponse),
    /// Response to `RequestModelSync`.
    RequestModelSync(RequestModelSyncResponse),
    /// Response to `ConfirmModelSync`.
    ConfirmModelSync(ConfirmModelSyncResponse),
    /// Response to `BroadcastModelUpdate`.
    BroadcastModelUpdate(BroadcastModelUpdateResponse),
    /// Response to `SubmitErasureRequest`.
    SubmitErasureRequest(SubmitErasureRequestResponse),
    /// Response to `ProcessErasureRequest`.
    ProcessErasureRequest(ProcessErasureRequestResponse),
    /// Response to `GenerateErasureCertificate`.
    GenerateErasureCertificate(GenerateErasureCertificateResponse),
    /// Response to `UpdateParams`.
    UpdateParams(UpdateParamsResponse),
    /// Response to `UpdateBorderlineParams`.
    UpdateBorderlineParams(UpdateBorderlineParamsResponse),
    /// Response to `HandleBorderlineFallbackCompleted`.
    HandleBorderlineFallbackCompleted(FallbackCompletedResponse),
    /// Response to `RegisterBiometricTemplate`.
    RegisterBiometricTemplate(RegisterBiometricTemplateResponse),
}

impl VeidModule {
    /// Routes one message to its handler. The match is exhaustive: adding a
    /// message without a handler is a compile error.
    pub fn handle(
        &self,
        state: &mut dyn StateAccess,
        msg: IdentityMsg,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<IdentityResponse, IdentityError> {
        match msg {
            IdentityMsg::CreateIdentityWallet(p) => self
                .create_wallet(state, p, ctx, sink)
                .map(IdentityResponse::CreateIdentityWallet),
            IdentityMsg::RebindWallet(p) => self
                .rebind_wallet(state, p, ctx, sink)
                .map(IdentityResponse::RebindWallet),
            IdentityMsg::AddScopeToWallet(p) => self
                .add_scope_to_wallet(state, p, ctx, sink)
                .map(IdentityResponse::AddScopeToWallet),
            IdentityMsg::RevokeScopeFromWallet(p) => self
                .revoke_scope_from_wallet(state, p, ctx, sink)
                .map(IdentityResponse::RevokeScopeFromWallet),
            IdentityMsg::UpdateConsentSettings(p) => self
                .update_consent_settings(state, p, ctx, sink)
                .map(IdentityResponse::UpdateConsentSettings),
            IdentityMsg::UploadScope(p) => self
                .upload_scope(state, p, ctx, sink)
                .map(IdentityResponse::UploadScope),
            IdentityMsg::RequestVerification(p) => self
                .request_verification(state, p, ctx, sink)
                .map(IdentityResponse::RequestVerification),
            IdentityMsg::UpdateVerificationStatus(p) => self
                .update_verification_status(state, p, ctx, sink)
                .map(IdentityResponse::UpdateVerificationStatus),
            IdentityMsg::RevokeScope(p) => self
                .revoke_scope(state, p, ctx, sink)
                .map(IdentityResponse::RevokeScope),
            IdentityMsg::SubmitAppeal(p) => self
                .submit_appeal(state, p, ctx, sink)
                .map(IdentityResponse::SubmitAppeal),
            IdentityMsg::ClaimAppeal(p) => self
                .claim_appeal(state, p, ctx, sink)
                .map(IdentityResponse::ClaimAppeal),
            IdentityMsg::ResolveAppeal(p) => self
                .resolve_appeal(state, p, ctx, sink)
                .map(IdentityResponse::ResolveAppeal),
            IdentityMsg::WithdrawAppeal(p) => self
                .withdraw_appeal(state, p, ctx, sink)
                .map(IdentityResponse::WithdrawAppeal),
            IdentityMsg::CreateDelegation(p) => self
                .create_delegation(state, p, ctx, sink)
                .map(IdentityResponse::CreateDelegation),
            IdentityMsg::RevokeDelegation(p) => self
                .revoke_delegation(state, p, ctx, sink)
                .map(IdentityResponse::RevokeDelegation),
            IdentityMsg::UseDelegation(p) => self
                .use_delegation(state, p, ctx, sink)
                .map(IdentityResponse::UseDelegation),
            IdentityMsg::RegisterModel(p) => self
                .register_model(state, p, ctx, sink)
                .map(IdentityResponse::RegisterModel),
            IdentityMsg::ProposeModelUpdate(p) => self
                .propose_model_update(state, p, ctx, sink)
                .map(IdentityResponse::ProposeModelUpdate),
            IdentityMsg::ApproveModelProposal(p) => self
                .approve_model_proposal(state, p, ctx, sink)
                .map(IdentityResponse::ApproveModelProposal),
            IdentityMsg::RegisterPipelineVersion(p) => self
                .register_pipeline_version(state, p, ctx, sink)
                .map(IdentityResponse::RegisterPipelineVersion),
            IdentityMsg::ActivatePipelineVersion(p) => self
                .activate_pipeline_version(state, p, ctx, sink)
                .map(IdentityResponse::ActivatePipelineVersion),
            IdentityMsg::RecordPipelineExecution(p) => self
                .record_pipeline_execution(state, p, ctx, sink)
                .map(IdentityResponse::RecordPipelineExecution),
            IdentityMsg::RequestModelSync(p) => self
                .request_model_sync(state, p, ctx, sink)
                .map(IdentityResponse::RequestModelSync),
            IdentityMsg::ConfirmModelSync(p) => self
                .confirm_model_sync(state, p, ctx, sink)
                .map(IdentityResponse::ConfirmModelSync),
            IdentityMsg::BroadcastModelUpdate(p) => self
                .broadcast_model_update(state, p, ctx, sink)
                .map(IdentityResponse::BroadcastModelUpdate),
            IdentityMsg::SubmitErasureRequest(p) => self
                .submit_erasure_request(state, p, ctx, sink)
                .map(IdentityResponse::SubmitErasureRequest),
            IdentityMsg::ProcessErasureRequest(p) => self
                .process_erasure_request(state, p, ctx, sink)
                .map(IdentityResponse::ProcessErasureRequest),
            IdentityMsg::GenerateErasureCertificate(p) => self
                .generate_erasure_certificate(state, p, ctx, sink)
                .map(IdentityResponse::GenerateErasureCertificate),
            IdentityMsg::UpdateParams(p) => self
                .update_params(state, p, ctx, sink)
                .map(IdentityResponse::UpdateParams),
            IdentityMsg::UpdateBorderlineParams(p) => self
                .update_borderline_params(state, p, ctx, sink)
                .map(IdentityResponse::UpdateBorderlineParams),
            IdentityMsg::HandleBorderlineFallbackCompleted(p) => self
                .handle_borderline_fallback_completed(state, p, ctx, sink)
                .map(IdentityResponse::HandleBorderlineFallbackCompleted),
            IdentityMsg::RegisterBiometricTemplate(p) => self
                .register_biometric_template(state, p, ctx, sink)
                .map(IdentityResponse::RegisterBiometricTemplate),
        }
    }
}
