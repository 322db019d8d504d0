//! The appeal state machine: submission, claiming, resolution, withdrawal
//! and the stale-claim release sweep.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    domain_hash, AppealRecord, AppealResolution, AppealStatus, IdentityEvent, ScopeStatus,
    ScoreStatus,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `SubmitAppeal`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct SubmitAppealParams {
    /// The rejected scope being disputed.
    pub scope_id: String,
    /// Free-text justification; length-bounded by module parameters.
    pub reason: String,
    /// Content hashes of supporting evidence.
    pub evidence_hashes: Vec<[u8; 32]>,
}

/// Response to `SubmitAppeal`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct SubmitAppealResponse {
    /// The new appeal id.
    pub appeal_id: String,
    /// The monotonic appeal number for this (account, scope).
    pub appeal_number: u32,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `ClaimAppeal`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ClaimAppealParams {
    /// The appeal to claim.
    pub appeal_id: String,
}

/// Response to `ClaimAppeal`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ClaimAppealResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `ResolveAppeal`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ResolveAppealParams {
    /// The appeal to resolve.
    pub appeal_id: String,
    /// The outcome.
    pub resolution: AppealResolution,
    /// Free-text resolution notes.
    pub notes: Option<String>,
    /// Signed score adjustment applied on approval.
    pub score_adjustment: i32,
}

/// Response to `ResolveAppeal`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ResolveAppealResponse {
    /// The wallet score after an applied adjustment, if one was applied.
    pub new_score: Option<u32>,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `WithdrawAppeal`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct WithdrawAppealParams {
    /// The appeal to withdraw.
    pub appeal_id: String,
}

/// Response to `WithdrawAppeal`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct WithdrawAppealResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    pub(crate) fn appeal_key(appeal_id: &str) -> Vec<u8> {
        keys::key1(keys::APPEAL_PREFIX, appeal_id.as_bytes())
    }

    fn pending_queue_key(appeal: &AppealRecord) -> Vec<u8> {
        keys::time_ordered_key(
            keys::PENDING_APPEAL_PREFIX,
            appeal.submitted_at_time,
            appeal.appeal_id.as_bytes(),
        )
    }

    pub(crate) fn load_appeal(
        &self,
        state: &dyn StateAccess,
        appeal_id: &str,
    ) -> Result<AppealRecord, IdentityError> {
        let appeal = store::get_typed(state, &Self::appeal_key(appeal_id))?;
        store::require(appeal, "appeal", appeal_id)
    }

    pub(crate) fn save_appeal(
        &self,
        state: &mut dyn StateAccess,
        appeal: &AppealRecord,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::appeal_key(&appeal.appeal_id), appeal)
    }

    /// Handles `SubmitAppeal`.
    pub fn submit_appeal(
        &self,
        state: &mut dyn StateAccess,
        params: SubmitAppealParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<SubmitAppealResponse, IdentityError> {
        let account = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        if !module_params.appeal.enabled {
            return Err(IdentityError::Precondition(
                "the appeal system is disabled".into(),
            ));
        }

        let reason_len = params.reason.len() as u32;
        if reason_len < module_params.appeal.min_reason_len
            || reason_len > module_params.appeal.max_reason_len
        {
            return Err(IdentityError::InvalidParameter(format!(
                "reason length {} outside [{}, {}]",
                reason_len,
                module_params.appeal.min_reason_len,
                module_params.appeal.max_reason_len
            )));
        }
        if params.evidence_hashes.len() as u32 > module_params.appeal.max_evidence_hashes {
            return Err(IdentityError::InvalidParameter(format!(
                "too many evidence hashes ({})",
                params.evidence_hashes.len()
            )));
        }

        let scope = self.load_scope(state, &params.scope_id)?;
        if scope.account != account {
            return Err(IdentityError::Unauthorized(format!(
                "scope {} is not owned by the caller",
                params.scope_id
            )));
        }
        if scope.status != ScopeStatus::Rejected {
            return Err(IdentityError::Precondition(format!(
                "scope {} is not rejected",
                params.scope_id
            )));
        }
        let rejected_at_height = scope.rejected_at_height.ok_or_else(|| {
            IdentityError::Precondition(format!(
                "scope {} has no recorded rejection height",
                params.scope_id
            ))
        })?;
        if ctx.block_height.saturating_sub(rejected_at_height)
            > module_params.appeal.appeal_window_blocks
        {
            return Err(IdentityError::Expired("the appeal window has closed".into()));
        }
        if let Some(rejected_at_time) = scope.rejected_at_time {
            if ctx.block_time.saturating_sub(rejected_at_time)
                > module_params.appeal.hard_cutoff_secs
            {
                return Err(IdentityError::Expired(
                    "the appeal hard cutoff has passed".into(),
                ));
            }
        }

        let count_key = keys::key2(
            keys::APPEAL_COUNT_PREFIX,
            account.as_ref(),
            params.scope_id.as_bytes(),
        );
        let count: u32 = store::get_typed(state, &count_key)?.unwrap_or(0);
        if count >= module_params.appeal.max_appeals_per_scope {
            return Err(IdentityError::QuotaExceeded(format!(
                "scope {} has reached its appeal limit",
                params.scope_id
            )));
        }

        // At most one Active appeal per (account, scope).
        let by_scope_prefix = keys::key2(
            keys::APPEAL_BY_SCOPE_PREFIX,
            params.scope_id.as_bytes(),
            b"",
        );
        for (index_key, _) in store::collect_prefix(state, &by_scope_prefix)? {
            let appeal_id = String::from_utf8(index_key[by_scope_prefix.len()..].to_vec())
                .map_err(|_| {
                    IdentityError::State(veid_types::error::StateError::IndexCorruption(
                        "appeal-by-scope key not utf8".into(),
                    ))
                })?;
            let existing = self.load_appeal(state, &appeal_id)?;
            if existing.status.is_active() {
                return Err(IdentityError::AlreadyExists {
                    entity: "appeal",
                    id: appeal_id,
                });
            }
        }

        let wallet = self.load_wallet(state, &account)?;
        let appeal_id = hex::encode(domain_hash(
            b"VEID-APPEAL-ID::V1",
            &[
                account.as_ref(),
                params.scope_id.as_bytes(),
                &ctx.block_height.to_be_bytes(),
            ],
        ));
        let appeal = AppealRecord {
            appeal_id: appeal_id.clone(),
            account,
            scope_id: params.scope_id.clone(),
            original_score: wallet.current_score,
            reason: params.reason,
            evidence_hashes: params.evidence_hashes,
            submitted_at_height: ctx.block_height,
            submitted_at_time: ctx.block_time,
            appeal_number: count + 1,
            status: AppealStatus::Pending,
            reviewer: None,
            claimed_at_height: None,
            resolved_at_height: None,
            resolution_notes: None,
            score_adjustment: 0,
        };

        self.save_appeal(state, &appeal)?;
        store::put_typed(state, &count_key, &(count + 1))?;
        store::put_index(
            state,
            &keys::key3(
                keys::APPEAL_BY_ACCOUNT_PREFIX,
                account.as_ref(),
                &ctx.block_time.to_be_bytes(),
                appeal_id.as_bytes(),
            ),
        )?;
        store::put_index(
            state,
            &keys::key2(
                keys::APPEAL_BY_SCOPE_PREFIX,
                params.scope_id.as_bytes(),
                appeal_id.as_bytes(),
            ),
        )?;
        store::put_index(state, &Self::pending_queue_key(&appeal))?;

        sink.emit(IdentityEvent::AppealSubmitted {
            appeal_id: appeal_id.clone(),
            account,
            scope_id: params.scope_id,
        });
        Ok(SubmitAppealResponse {
            appeal_id,
            appeal_number: count + 1,
            height: ctx.block_height,
        })
    }

    /// Handles `ClaimAppeal`: Pending → Reviewing by an authorized resolver.
    pub fn claim_appeal(
        &self,
        state: &mut dyn StateAccess,
        params: ClaimAppealParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ClaimAppealResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        if !store::is_authorized_resolver(state, &module_params, &caller)? {
            return Err(IdentityError::Unauthorized(
                "claiming requires the authority, a bonded validator or a whitelisted resolver"
                    .into(),
            ));
        }

        let mut appeal = self.load_appeal(state, &params.appeal_id)?;
        if appeal.status != AppealStatus::Pending {
            return Err(IdentityError::Precondition(format!(
                "appeal {} is not pending",
                params.appeal_id
            )));
        }

        appeal.status = AppealStatus::Reviewing;
        appeal.reviewer = Some(caller);
        appeal.claimed_at_height = Some(ctx.block_height);
        state.delete(&Self::pending_queue_key(&appeal))?;
        self.save_appeal(state, &appeal)?;

        sink.emit(IdentityEvent::AppealClaimed {
            appeal_id: params.appeal_id,
            reviewer: caller,
        });
        Ok(ClaimAppealResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `ResolveAppeal`.
    ///
    /// On approval with a non-zero adjustment the disputed scope moves
    /// Rejected → Verified and the wallet score is adjusted exactly once,
    /// clamped to [0, 100].
    pub fn resolve_appeal(
        &self,
        state: &mut dyn StateAccess,
        params: ResolveAppealParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ResolveAppealResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let module_params = store::load_params(state)?;
        if !store::is_authorized_resolver(state, &module_params, &caller)? {
            return Err(IdentityError::Unauthorized(
                "resolution requires the authority, a bonded validator or a whitelisted resolver"
                    .into(),
            ));
        }

        let mut appeal = self.load_appeal(state, &params.appeal_id)?;
        if !appeal.status.is_active() {
            return Err(IdentityError::Precondition(format!(
                "appeal {} is already resolved",
                params.appeal_id
            )));
        }
        // The claiming reviewer owns the resolution; the authority overrides.
        if let Some(reviewer) = appeal.reviewer {
            if caller != reviewer && caller != module_params.authority {
                return Err(IdentityError::Unauthorized(format!(
                    "appeal {} is claimed by another reviewer",
                    params.appeal_id
                )));
            }
        }
        if appeal.status == AppealStatus::Pending {
            state.delete(&Self::pending_queue_key(&appeal))?;
        }

        let mut new_score = None;
        if params.resolution == AppealResolution::Approved && params.score_adjustment != 0 {
            let mut scope = self.load_scope(state, &appeal.scope_id)?;
            if scope.status == ScopeStatus::Rejected {
                scope.status = ScopeStatus::Verified;
                self.save_scope(state, &scope)?;
                sink.emit(IdentityEvent::VerificationStatusChanged {
                    scope_id: scope.scope_id.clone(),
                    old_status: "rejected".to_string(),
                    new_status: "verified".to_string(),
                });
            }

            let wallet = self.load_wallet(state, &appeal.account)?;
            let old_score = wallet.current_score;
            let adjusted = Self::clamp_adjustment(old_score, params.score_adjustment);
            self.set_score(
                state,
                &appeal.account,
                adjusted,
                ScoreStatus::Verified,
                "appeal_adjustment",
                ctx,
                sink,
            )?;
            sink.emit(IdentityEvent::AppealScoreAdjusted {
                appeal_id: params.appeal_id.clone(),
                account: appeal.account,
                old_score,
                new_score: adjusted,
            });
            new_score = Some(adjusted);
        }

        appeal.status = match params.resolution {
            AppealResolution::Approved => AppealStatus::Approved,
            AppealResolution::Rejected => AppealStatus::Rejected,
        };
        appeal.reviewer = appeal.reviewer.or(Some(caller));
        appeal.resolved_at_height = Some(ctx.block_height);
        appeal.resolution_notes = params.notes;
        appeal.score_adjustment = params.score_adjustment;
        self.save_appeal(state, &appeal)?;

        sink.emit(IdentityEvent::AppealResolved {
            appeal_id: params.appeal_id,
            resolution: params.resolution,
            resolver: caller,
        });
        Ok(ResolveAppealResponse {
            new_score,
            height: ctx.block_height,
        })
    }

    /// Handles `WithdrawAppeal` by the submitter.
    pub fn withdraw_appeal(
        &self,
        state: &mut dyn StateAccess,
        params: WithdrawAppealParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<WithdrawAppealResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let mut appeal = self.load_appeal(state, &params.appeal_id)?;
        if appeal.account != caller {
            return Err(IdentityError::Unauthorized(
                "only the submitter may withdraw an appeal".into(),
            ));
        }
        if !appeal.status.is_active() {
            return Err(IdentityError::Precondition(format!(
                "appeal {} is not active",
                params.appeal_id
            )));
        }

        if appeal.status == AppealStatus::Pending {
            state.delete(&Self::pending_queue_key(&appeal))?;
        }
        appeal.status = AppealStatus::Withdrawn;
        appeal.resolved_at_height = Some(ctx.block_height);
        self.save_appeal(state, &appeal)?;

        sink.emit(IdentityEvent::AppealWithdrawn {
            appeal_id: params.appeal_id,
        });
        Ok(WithdrawAppealResponse {
            height: ctx.block_height,
        })
    }

    /// End-of-block sweep. Releases Reviewing claims whose review timeout has
    /// passed back to Pending, and expires Pending appeals past the hard
    /// cutoff. Returns the number of claims released.
    pub fn expire_stale_appeals(&self, state: &mut dyn StateAccess, ctx: &TxContext) -> u32 {
        let module_params = match store::load_params(state) {
            Ok(p) => p,
            Err(e) => {
                log::error!("[veid] appeal sweep could not load params: {}", e);
                return 0;
            }
        };
        let snapshot = match store::collect_prefix(state, &[keys::APPEAL_PREFIX]) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[veid] appeal sweep scan failed: {}", e);
                return 0;
            }
        };

        let mut released = 0u32;
        for (_key, value) in snapshot {
            let mut appeal: AppealRecord = match veid_types::codec::from_bytes_canonical(&value) {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("[veid] skipping undecodable appeal in sweep: {}", e);
                    continue;
                }
            };
            match appeal.status {
                AppealStatus::Reviewing => {
                    let claimed_at = match appeal.claimed_at_height {
                        Some(h) => h,
                        None => {
                            log::warn!(
                                "[veid] reviewing appeal {} has no claim height",
                                appeal.appeal_id
                            );
                            continue;
                        }
                    };
                    if claimed_at + module_params.appeal.review_timeout_blocks >= ctx.block_height {
                        continue;
                    }
                    appeal.status = AppealStatus::Pending;
                    appeal.reviewer = None;
                    appeal.claimed_at_height = None;
                    let queue_key = Self::pending_queue_key(&appeal);
                    if let Err(e) = self
                        .save_appeal(state, &appeal)
                        .and_then(|_| store::put_index(state, &queue_key))
                    {
                        log::warn!(
                            "[veid] failed to release appeal {}: {}",
                            appeal.appeal_id,
                            e
                        );
                        continue;
                    }
                    released += 1;
                }
                AppealStatus::Pending => {
                    if appeal.submitted_at_time + module_params.appeal.hard_cutoff_secs
                        >= ctx.block_time
                    {
                        continue;
                    }
                    appeal.status = AppealStatus::Expired;
                    appeal.resolved_at_height = Some(ctx.block_height);
                    let queue_key = Self::pending_queue_key(&appeal);
                    if let Err(e) = self.save_appeal(state, &appeal) {
                        log::warn!(
                            "[veid] failed to expire appeal {}: {}",
                            appeal.appeal_id,
                            e
                        );
                        continue;
                    }
                    if let Err(e) = state.delete(&queue_key) {
                        log::warn!(
                            "[veid] failed to dequeue expired appeal {}: {}",
                            appeal.appeal_id,
                            e
                        );
                    }
                    log::info!("[veid] appeal {} expired unclaimed", appeal.appeal_id);
                }
                _ => {}
            }
        }
        released
    }
}
