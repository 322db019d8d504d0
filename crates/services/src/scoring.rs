//! Composite scoring and tier transitions.
//!
//! The composite score is the weight sum of the wallet's verified,
//! non-revoked scopes, capped at 100. The tier is a pure function of
//! (score, score_status, locked); `TierChanged` is emitted strictly on
//! change to keep the event stream minimal.

use crate::store;
use crate::VeidModule;
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    AccountId, IdentityEvent, IdentityScope, ScoreStatus, Tier, VerificationEntry, Wallet,
};
use veid_types::error::IdentityError;
use veid_types::keys;
use veid_types::service_configs::VeidParams;

impl VeidModule {
    /// Recomputes the wallet's composite score from its referenced scopes.
    pub(crate) fn compute_composite_score(
        &self,
        state: &dyn StateAccess,
        wallet: &Wallet,
        params: &VeidParams,
    ) -> Result<u32, IdentityError> {
        let mut total: u32 = 0;
        for scope_ref in &wallet.scope_refs {
            let key = keys::key1(keys::SCOPE_PREFIX, scope_ref.scope_id.as_bytes());
            let scope: Option<IdentityScope> = store::get_typed(state, &key)?;
            let scope = store::require(scope, "scope", scope_ref.scope_id.clone())?;
            if scope.is_scorable() {
                total += params.score_weights.get(&scope.scope_type).copied().unwrap_or(0);
            }
        }
        Ok(total.min(100))
    }

    /// Writes a score directly, records a history entry and applies the tier
    /// transition. Used by appeal adjustments and borderline fallbacks, where
    /// the score is decided rather than recomputed.
    pub(crate) fn set_score(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        new_score: u32,
        status: ScoreStatus,
        reason: &str,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<Wallet, IdentityError> {
        let key = keys::key1(keys::WALLET_PREFIX, account.as_ref());
        let wallet: Option<Wallet> = store::get_typed(state, &key)?;
        let mut wallet = store::require(wallet, "wallet", account.to_string())?;

        let old_tier = wallet.tier;
        wallet.current_score = new_score;
        wallet.score_status = status;
        wallet.verification_history.push(VerificationEntry {
            score: new_score,
            status,
            reason: reason.to_string(),
            height: ctx.block_height,
            time: ctx.block_time,
        });
        wallet.tier = Tier::for_score(new_score, status, wallet.locked);
        store::put_typed(state, &key, &wallet)?;

        if wallet.tier != old_tier {
            sink.emit(IdentityEvent::TierChanged {
                account: *account,
                old_tier,
                new_tier: wallet.tier,
                score: new_score,
            });
        }
        Ok(wallet)
    }

    /// Recomputes the composite score and tier for an account and persists
    /// both. Emits `TierChanged` iff the tier actually changed.
    pub(crate) fn update_account_tier(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        sink: &mut EventSink,
    ) -> Result<Wallet, IdentityError> {
        let params = store::load_params(state)?;
        let key = keys::key1(keys::WALLET_PREFIX, account.as_ref());
        let wallet: Option<Wallet> = store::get_typed(state, &key)?;
        let mut wallet = store::require(wallet, "wallet", account.to_string())?;

        let score = self.compute_composite_score(state, &wallet, &params)?;
        let old_tier = wallet.tier;
        wallet.current_score = score;
        wallet.tier = Tier::for_score(score, wallet.score_status, wallet.locked);
        store::put_typed(state, &key, &wallet)?;

        if wallet.tier != old_tier {
            sink.emit(IdentityEvent::TierChanged {
                account: *account,
                old_tier,
                new_tier: wallet.tier,
                score,
            });
        }
        Ok(wallet)
    }

    /// Clamp-applies a signed adjustment to a score.
    pub(crate) fn clamp_adjustment(old_score: u32, adjustment: i32) -> u32 {
        let adjusted = old_score as i64 + adjustment as i64;
        adjusted.clamp(0, 100) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_clamps_to_score_range() {
        assert_eq!(VeidModule::clamp_adjustment(95, 20), 100);
        assert_eq!(VeidModule::clamp_adjustment(10, -30), 0);
        assert_eq!(VeidModule::clamp_adjustment(70, 15), 85);
    }
}
