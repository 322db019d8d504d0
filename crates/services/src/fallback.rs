//! The borderline MFA fallback handler.
//!
//! Created when a verification lands the composite score inside the
//! borderline band; the decision defers to an external MFA challenge whose
//! status the module reads through the [`veid_api::oracle::MfaOracle`] seam.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    domain_hash, AccountId, BorderlineFallbackRecord, ChallengeStatus, FallbackStatus,
    IdentityEvent, ScoreStatus,
};
use veid_types::error::IdentityError;
use veid_types::keys;
use veid_types::service_configs::VeidParams;

/// Parameters for `HandleBorderlineFallbackCompleted`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct FallbackCompletedParams {
    /// The MFA challenge that concluded.
    pub challenge_id: String,
    /// The factors the MFA subsystem reports satisfied.
    pub factors_satisfied: Vec<String>,
}

/// Response to `HandleBorderlineFallbackCompleted`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct FallbackCompletedResponse {
    /// The fallback status after handling.
    pub status: FallbackStatus,
    /// The committed score, on success.
    pub score: Option<u32>,
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    fn fallback_key(fallback_id: &str) -> Vec<u8> {
        keys::key1(keys::FALLBACK_PREFIX, fallback_id.as_bytes())
    }

    fn challenge_pointer_key(challenge_id: &str) -> Vec<u8> {
        keys::key1(keys::FALLBACK_BY_CHALLENGE_PREFIX, challenge_id.as_bytes())
    }

    fn fallback_expiry_key(record: &BorderlineFallbackRecord) -> Vec<u8> {
        keys::time_ordered_key(
            keys::FALLBACK_BY_EXPIRY_PREFIX,
            record.expires_at,
            record.fallback_id.as_bytes(),
        )
    }

    pub(crate) fn load_fallback(
        &self,
        state: &dyn StateAccess,
        fallback_id: &str,
    ) -> Result<BorderlineFallbackRecord, IdentityError> {
        let record = store::get_typed(state, &Self::fallback_key(fallback_id))?;
        store::require(record, "borderline fallback", fallback_id)
    }

    fn save_fallback(
        &self,
        state: &mut dyn StateAccess,
        record: &BorderlineFallbackRecord,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::fallback_key(&record.fallback_id), record)
    }

    /// Creates a Pending fallback record for a borderline score. Called from
    /// the verification path; the caller has already parked the wallet score.
    pub(crate) fn create_borderline_fallback(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        challenge_id: &str,
        borderline_score: u32,
        params: &VeidParams,
        ctx: &TxContext,
    ) -> Result<String, IdentityError> {
        let pointer_key = Self::challenge_pointer_key(challenge_id);
        if state.get(&pointer_key)?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "borderline fallback",
                id: challenge_id.to_string(),
            });
        }

        let fallback_id = hex::encode(domain_hash(
            b"VEID-FALLBACK-ID::V1",
            &[
                account.as_ref(),
                challenge_id.as_bytes(),
                &ctx.block_height.to_be_bytes(),
            ],
        ));
        let record = BorderlineFallbackRecord {
            fallback_id: fallback_id.clone(),
            account: *account,
            challenge_id: challenge_id.to_string(),
            borderline_score,
            status: FallbackStatus::Pending,
            factors_satisfied: Vec::new(),
            created_at: ctx.block_time,
            expires_at: ctx.block_time + params.borderline.fallback_expiry_secs,
        };
        self.save_fallback(state, &record)?;
        store::put_typed(state, &pointer_key, &fallback_id)?;
        store::put_index(state, &Self::fallback_expiry_key(&record))?;

        log::info!(
            "[veid] borderline score {} for {} deferred to challenge {}",
            borderline_score,
            account,
            challenge_id
        );
        Ok(fallback_id)
    }

    /// Handles `HandleBorderlineFallbackCompleted`.
    ///
    /// On success the parked score is committed with Verified status and the
    /// tier upgraded if applicable; on a failed challenge the record moves to
    /// Failed. A challenge the oracle still reports Pending aborts the
    /// message unchanged.
    pub fn handle_borderline_fallback_completed(
        &self,
        state: &mut dyn StateAccess,
        params: FallbackCompletedParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<FallbackCompletedResponse, IdentityError> {
        let caller = ctx.signer_account_id;
        let fallback_id: Option<String> =
            store::get_typed(state, &Self::challenge_pointer_key(&params.challenge_id))?;
        let fallback_id =
            store::require(fallback_id, "borderline fallback", params.challenge_id.clone())?;
        let mut record = self.load_fallback(state, &fallback_id)?;

        if record.account != caller {
            return Err(IdentityError::Unauthorized(
                "fallback completion must come from the affected account".into(),
            ));
        }
        if record.status != FallbackStatus::Pending {
            return Err(IdentityError::Precondition(format!(
                "fallback {} is not pending",
                fallback_id
            )));
        }
        if record.expires_at <= ctx.block_time {
            return Err(IdentityError::Expired(format!(
                "fallback {} has expired",
                fallback_id
            )));
        }

        let module_params = store::load_params(state)?;
        let challenge_status = self.mfa.challenge_status(&params.challenge_id);
        match challenge_status {
            ChallengeStatus::Pending => {
                return Err(IdentityError::Precondition(format!(
                    "challenge {} has not concluded",
                    params.challenge_id
                )));
            }
            ChallengeStatus::Expired => {
                return Err(IdentityError::Expired(format!(
                    "challenge {} has expired",
                    params.challenge_id
                )));
            }
            ChallengeStatus::Failed => {
                record.status = FallbackStatus::Failed;
                record.factors_satisfied = params.factors_satisfied;
                self.save_fallback(state, &record)?;
                sink.emit(IdentityEvent::BorderlineFallbackFailed {
                    fallback_id: fallback_id.clone(),
                    account: record.account,
                });
                sink.emit(IdentityEvent::AuthorizationExpired {
                    account: record.account,
                    reference: params.challenge_id,
                });
                return Ok(FallbackCompletedResponse {
                    status: FallbackStatus::Failed,
                    score: None,
                    height: ctx.block_height,
                });
            }
            ChallengeStatus::Verified => {}
        }

        if (params.factors_satisfied.len() as u32) < module_params.borderline.min_factors_satisfied
        {
            record.status = FallbackStatus::Failed;
            record.factors_satisfied = params.factors_satisfied;
            self.save_fallback(state, &record)?;
            sink.emit(IdentityEvent::BorderlineFallbackFailed {
                fallback_id: fallback_id.clone(),
                account: record.account,
            });
            sink.emit(IdentityEvent::AuthorizationExpired {
                account: record.account,
                reference: params.challenge_id,
            });
            return Ok(FallbackCompletedResponse {
                status: FallbackStatus::Failed,
                score: None,
                height: ctx.block_height,
            });
        }

        record.status = FallbackStatus::Completed;
        record.factors_satisfied = params.factors_satisfied;
        self.save_fallback(state, &record)?;

        self.set_score(
            state,
            &record.account,
            record.borderline_score,
            ScoreStatus::Verified,
            "borderline_fallback",
            ctx,
            sink,
        )?;
        sink.emit(IdentityEvent::AuthorizationGranted {
            account: record.account,
            challenge_id: params.challenge_id,
        });
        sink.emit(IdentityEvent::BorderlineFallbackCompleted {
            fallback_id,
            account: record.account,
            score: record.borderline_score,
        });
        Ok(FallbackCompletedResponse {
            status: FallbackStatus::Completed,
            score: Some(record.borderline_score),
            height: ctx.block_height,
        })
    }

    /// End-of-block sweep: expires Pending fallbacks past their expiry.
    pub fn expire_borderline_fallbacks(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) {
        let snapshot = match store::collect_prefix(state, &[keys::FALLBACK_BY_EXPIRY_PREFIX]) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[veid] fallback expiry scan failed: {}", e);
                return;
            }
        };
        for (index_key, _) in snapshot {
            match keys::time_component(&index_key) {
                Some(expires_at) if expires_at <= ctx.block_time => {}
                _ => break,
            }
            let id_start = 1 + 8 + 1;
            let fallback_id = match index_key
                .get(id_start..)
                .and_then(|b| String::from_utf8(b.to_vec()).ok())
            {
                Some(id) => id,
                None => {
                    log::warn!("[veid] malformed fallback expiry key; skipping");
                    continue;
                }
            };
            if let Err(e) = state.delete(&index_key) {
                log::warn!("[veid] failed to dequeue fallback {}: {}", fallback_id, e);
                continue;
            }
            let mut record = match self.load_fallback(state, &fallback_id) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!(
                        "[veid] expiry index pointed at missing fallback {}: {}",
                        fallback_id,
                        e
                    );
                    continue;
                }
            };
            if record.status != FallbackStatus::Pending {
                continue;
            }
            record.status = FallbackStatus::Expired;
            if let Err(e) = self.save_fallback(state, &record) {
                log::warn!("[veid] failed to expire fallback {}: {}", fallback_id, e);
                continue;
            }
            sink.emit(IdentityEvent::BorderlineFallbackExpired {
                fallback_id: record.fallback_id.clone(),
            });
            sink.emit(IdentityEvent::AuthorizationExpired {
                account: record.account,
                reference: record.challenge_id,
            });
        }
    }
}
