//! Scope operations: upload, verification lifecycle, revocation and the
//! expiry sweep.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    domain_hash, sha256, verify_signature, IdentityEvent, IdentityScope, ScopeStatus, ScopeType,
    ScoreStatus, UploadMetadata,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `UploadScope`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UploadScopeParams {
    /// Evidence kind.
    pub scope_type: ScopeType,
    /// Opaque encrypted envelope.
    pub encrypted_payload: Vec<u8>,
    /// Client-chosen salt.
    pub salt: Vec<u8>,
    /// SHA-256 of the salt.
    pub salt_hash: [u8; 32],
    /// Opaque device fingerprint.
    pub device_fingerprint: String,
    /// Client signature over the payload hash, when required by params.
    pub client_signature: Vec<u8>,
    /// Binding-key signature over the payload hash, when required by params.
    pub user_signature: Vec<u8>,
    /// Content hash of the encrypted payload.
    pub payload_hash: Vec<u8>,
}

/// Response to `UploadScope`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct UploadScopeResponse {
    /// The derived scope id.
    pub scope_id: String,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `RequestVerification`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RequestVerificationParams {
    /// The scope to verify.
    pub scope_id: String,
}

/// Response to `RequestVerification`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RequestVerificationResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// The decision a verification worker can report.
#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The evidence verified.
    Verified,
    /// The evidence was rejected.
    Rejected,
}

/// Parameters for `UpdateVerificationStatus`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UpdateVerificationStatusParams {
    /// The scope that was verified.
    pub scope_id: String,
    /// The reported decision.
    pub outcome: VerificationOutcome,
    /// MFA challenge handle, required for the borderline fallback path.
    pub challenge_id: Option<String>,
}

/// Response to `UpdateVerificationStatus`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct UpdateVerificationStatusResponse {
    /// The scope status after the update.
    pub status: ScopeStatus,
    /// The borderline fallback created, if the score landed in the band.
    pub fallback_id: Option<String>,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `RevokeScope`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RevokeScopeParams {
    /// The scope to revoke.
    pub scope_id: String,
    /// The stated reason.
    pub reason: String,
}

/// Response to `RevokeScope`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RevokeScopeResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

pub(crate) fn status_label(status: ScopeStatus) -> &'static str {
    match status {
        ScopeStatus::Pending => "pending",
        ScopeStatus::InProgress => "in_progress",
        ScopeStatus::Verified => "verified",
        ScopeStatus::Rejected => "rejected",
        ScopeStatus::Expired => "expired",
    }
}

impl VeidModule {
    pub(crate) fn scope_key(scope_id: &str) -> Vec<u8> {
        keys::key1(keys::SCOPE_PREFIX, scope_id.as_bytes())
    }

    pub(crate) fn load_scope(
        &self,
        state: &dyn StateAccess,
        scope_id: &str,
    ) -> Result<IdentityScope, IdentityError> {
        let scope = store::get_typed(state, &Self::scope_key(scope_id))?;
        store::require(scope, "scope", scope_id)
    }

    pub(crate) fn save_scope(
        &self,
        state: &mut dyn StateAccess,
        scope: &IdentityScope,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::scope_key(&scope.scope_id), scope)
    }

    fn emit_status_change(
        sink: &mut EventSink,
        scope_id: &str,
        old: ScopeStatus,
        new: ScopeStatus,
    ) {
        sink.emit(IdentityEvent::VerificationStatusChanged {
            scope_id: scope_id.to_string(),
            old_status: status_label(old).to_string(),
            new_status: status_label(new).to_string(),
        });
    }

    /// Handles `UploadScope`.
    pub fn upload_scope(
        &self,
        state: &mut dyn StateAccess,
        params: UploadScopeParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<UploadScopeResponse, IdentityError> {
        let account = ctx.signer_account_id;
        let wallet = self.load_active_wallet(state, &account)?;
        let module_params = store::load_params(state)?;

        let salt_len = params.salt.len() as u32;
        if salt_len < module_params.scope.min_salt_len || salt_len > module_params.scope.max_salt_len
        {
            return Err(IdentityError::InvalidParameter(format!(
                "salt length {} outside [{}, {}]",
                salt_len, module_params.scope.min_salt_len, module_params.scope.max_salt_len
            )));
        }
        if sha256(&params.salt) != params.salt_hash {
            return Err(IdentityError::HashMismatch {
                expected: hex::encode(sha256(&params.salt)),
                got: hex::encode(params.salt_hash),
            });
        }
        if params.payload_hash.is_empty() {
            return Err(IdentityError::InvalidParameter(
                "payload hash must not be empty".into(),
            ));
        }
        if module_params.scope.require_user_signature {
            verify_signature(
                &wallet.binding_public_key,
                &params.payload_hash,
                &params.user_signature,
            )?;
        }
        if module_params.scope.require_client_signature && params.client_signature.len() != 64 {
            return Err(IdentityError::InvalidSignature(
                "client signature missing or malformed".into(),
            ));
        }

        // Quota checks walk the by-account index; the per-type count needs
        // the primary records.
        let index_prefix = keys::key2(keys::SCOPE_BY_ACCOUNT_PREFIX, account.as_ref(), b"");
        let existing = store::collect_prefix(state, &index_prefix)?;
        if existing.len() as u32 >= module_params.scope.max_scopes_per_account {
            return Err(IdentityError::QuotaExceeded(format!(
                "account {} already holds {} scopes",
                account,
                existing.len()
            )));
        }
        let mut same_type = 0u32;
        for (index_key, _) in &existing {
            let scope_id = Self::scope_id_of_index_key(index_key, account.as_ref())?;
            let scope = self.load_scope(state, &scope_id)?;
            if scope.scope_type == params.scope_type {
                same_type += 1;
            }
        }
        if same_type >= module_params.scope.max_scopes_per_type {
            return Err(IdentityError::QuotaExceeded(format!(
                "account {} already holds {} scopes of this type",
                account, same_type
            )));
        }

        let scope_id = hex::encode(domain_hash(
            b"VEID-SCOPE-ID::V1",
            &[
                account.as_ref(),
                &params.payload_hash,
                &ctx.block_height.to_be_bytes(),
            ],
        ));
        if state.get(&Self::scope_key(&scope_id))?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "scope",
                id: scope_id,
            });
        }

        let scope = IdentityScope {
            scope_id: scope_id.clone(),
            account,
            scope_type: params.scope_type,
            encrypted_payload: params.encrypted_payload,
            upload_metadata: UploadMetadata {
                salt: params.salt,
                salt_hash: params.salt_hash,
                device_fingerprint: params.device_fingerprint,
                client_signature: params.client_signature,
                user_signature: params.user_signature,
                payload_hash: params.payload_hash,
            },
            status: ScopeStatus::Pending,
            uploaded_at: ctx.block_time,
            uploaded_at_height: ctx.block_height,
            rejected_at_height: None,
            rejected_at_time: None,
            revoked: false,
            revocation_reason: None,
        };
        self.save_scope(state, &scope)?;
        store::put_index(
            state,
            &keys::key2(
                keys::SCOPE_BY_ACCOUNT_PREFIX,
                account.as_ref(),
                scope_id.as_bytes(),
            ),
        )?;

        sink.emit(IdentityEvent::ScopeUploaded {
            account,
            scope_id: scope_id.clone(),
        });
        Ok(UploadScopeResponse {
            scope_id,
            height: ctx.block_height,
        })
    }

    fn scope_id_of_index_key(index_key: &[u8], account: &[u8]) -> Result<String, IdentityError> {
        // Layout: <prefix>{account}/{scope_id}
        let id_start = 1 + account.len() + 1;
        let bytes = index_key.get(id_start..).ok_or_else(|| {
            IdentityError::State(veid_types::error::StateError::IndexCorruption(
                "scope index key too short".into(),
            ))
        })?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            IdentityError::State(veid_types::error::StateError::IndexCorruption(
                "scope index key not utf8".into(),
            ))
        })
    }

    /// Handles `RequestVerification`: Pending → InProgress by the owner.
    pub fn request_verification(
        &self,
        state: &mut dyn StateAccess,
        params: RequestVerificationParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<RequestVerificationResponse, IdentityError> {
        let mut scope = self.load_scope(state, &params.scope_id)?;
        if scope.account != ctx.signer_account_id {
            return Err(IdentityError::Unauthorized(format!(
                "scope {} is not owned by the caller",
                params.scope_id
            )));
        }
        if scope.status != ScopeStatus::Pending {
            return Err(IdentityError::Precondition(format!(
                "scope {} is not pending verification",
                params.scope_id
            )));
        }
        let old = scope.status;
        scope.status = ScopeStatus::InProgress;
        self.save_scope(state, &scope)?;
        Self::emit_status_change(sink, &params.scope_id, old, scope.status);
        Ok(RequestVerificationResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `UpdateVerificationStatus`: InProgress → {Verified, Rejected},
    /// reported by the authority or a bonded validator.
    ///
    /// A verification that lands the composite score inside the borderline
    /// band defers the commit to an external MFA challenge.
    pub fn update_verification_status(
        &self,
        state: &mut dyn StateAccess,
        params: UpdateVerificationStatusParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<UpdateVerificationStatusResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        if caller != module_params.authority && !store::is_bonded_validator(state, &caller)? {
            return Err(IdentityError::Unauthorized(
                "verification status updates require the authority or a bonded validator".into(),
            ));
        }

        let mut scope = self.load_scope(state, &params.scope_id)?;
        if scope.status != ScopeStatus::InProgress {
            return Err(IdentityError::Precondition(format!(
                "scope {} is not in progress",
                params.scope_id
            )));
        }
        let old = scope.status;

        match params.outcome {
            VerificationOutcome::Rejected => {
                scope.status = ScopeStatus::Rejected;
                scope.rejected_at_height = Some(ctx.block_height);
                scope.rejected_at_time = Some(ctx.block_time);
                self.save_scope(state, &scope)?;
                Self::emit_status_change(sink, &params.scope_id, old, scope.status);
                Ok(UpdateVerificationStatusResponse {
                    status: scope.status,
                    fallback_id: None,
                    height: ctx.block_height,
                })
            }
            VerificationOutcome::Verified => {
                scope.status = ScopeStatus::Verified;
                self.save_scope(state, &scope)?;
                Self::emit_status_change(sink, &params.scope_id, old, scope.status);

                let wallet = self.load_wallet(state, &scope.account)?;
                let composite =
                    self.compute_composite_score(state, &wallet, &module_params)?;

                let borderline = module_params.borderline.enabled
                    && Self::is_borderline(composite, module_params.borderline.band_width);
                if borderline {
                    if let Some(challenge_id) = params.challenge_id {
                        self.set_score(
                            state,
                            &scope.account,
                            composite,
                            ScoreStatus::Pending,
                            "borderline_pending",
                            ctx,
                            sink,
                        )?;
                        let fallback_id = self.create_borderline_fallback(
                            state,
                            &scope.account,
                            &challenge_id,
                            composite,
                            &module_params,
                            ctx,
                        )?;
                        return Ok(UpdateVerificationStatusResponse {
                            status: scope.status,
                            fallback_id: Some(fallback_id),
                            height: ctx.block_height,
                        });
                    }
                    log::warn!(
                        "[veid] borderline score {} for {} without a challenge id; committing",
                        composite,
                        scope.account
                    );
                }

                self.set_score(
                    state,
                    &scope.account,
                    composite,
                    ScoreStatus::Verified,
                    "verification_completed",
                    ctx,
                    sink,
                )?;
                Ok(UpdateVerificationStatusResponse {
                    status: scope.status,
                    fallback_id: None,
                    height: ctx.block_height,
                })
            }
        }
    }

    /// Whether a score sits inside the borderline band of a tier threshold.
    pub(crate) fn is_borderline(score: u32, band_width: u32) -> bool {
        [50u32, 70, 85]
            .iter()
            .any(|t| score.abs_diff(*t) <= band_width)
    }

    /// Handles `RevokeScope` by the owner or the authority. The prior status
    /// is preserved for audit.
    pub fn revoke_scope(
        &self,
        state: &mut dyn StateAccess,
        params: RevokeScopeParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<RevokeScopeResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        let mut scope = self.load_scope(state, &params.scope_id)?;
        if caller != scope.account && caller != module_params.authority {
            return Err(IdentityError::Unauthorized(format!(
                "scope {} may only be revoked by its owner or the authority",
                params.scope_id
            )));
        }
        if scope.revoked {
            return Err(IdentityError::Precondition(format!(
                "scope {} is already revoked",
                params.scope_id
            )));
        }
        if scope.status.is_terminal() {
            return Err(IdentityError::Precondition(format!(
                "scope {} is already terminal",
                params.scope_id
            )));
        }

        let was_scorable = scope.is_scorable();
        scope.revoked = true;
        scope.revocation_reason = Some(params.reason.clone());
        self.save_scope(state, &scope)?;

        sink.emit(IdentityEvent::ScopeRevoked {
            account: scope.account,
            scope_id: params.scope_id,
            reason: params.reason,
        });

        // A revoked verified scope stops contributing to the composite.
        if was_scorable {
            let wallet = self.load_wallet(state, &scope.account);
            if let Ok(wallet) = wallet {
                if wallet.scope_refs.iter().any(|r| r.scope_id == scope.scope_id) {
                    self.update_account_tier(state, &scope.account, sink)?;
                }
            }
        }
        Ok(RevokeScopeResponse {
            height: ctx.block_height,
        })
    }

    /// End-of-block sweep: any undecided scope past the expiry window moves
    /// to Expired. Failures on single records are logged and skipped.
    pub fn expire_stale_scopes(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) {
        let params = match store::load_params(state) {
            Ok(p) => p,
            Err(e) => {
                log::error!("[veid] scope expiry sweep could not load params: {}", e);
                return;
            }
        };
        let snapshot = match store::collect_prefix(state, &[keys::SCOPE_PREFIX]) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[veid] scope expiry sweep scan failed: {}", e);
                return;
            }
        };
        for (_key, value) in snapshot {
            let mut scope: IdentityScope = match veid_types::codec::from_bytes_canonical(&value) {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("[veid] skipping undecodable scope in expiry sweep: {}", e);
                    continue;
                }
            };
            if !scope.status.is_expirable() {
                continue;
            }
            if scope.uploaded_at + params.scope.expiry_window_secs >= ctx.block_time {
                continue;
            }
            let old = scope.status;
            scope.status = ScopeStatus::Expired;
            if let Err(e) = self.save_scope(state, &scope) {
                log::warn!("[veid] failed to expire scope {}: {}", scope.scope_id, e);
                continue;
            }
            Self::emit_status_change(sink, &scope.scope_id, old, ScopeStatus::Expired);
        }
    }
}
