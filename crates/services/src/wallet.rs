//! Wallet operations: creation, key rebinding, scope reference management
//! and consent settings.

use crate::store;
use crate::VeidModule;
use parity_scale_codec::{Decode, Encode};
use veid_api::events::EventSink;
use veid_api::state::StateAccess;
use veid_api::transaction::TxContext;
use veid_types::app::{
    binding_message, verify_signature, wallet_id_for_account, ConsentSettings, IdentityEvent,
    IdentityScope, ScopeReference, ScoreStatus, Tier, Wallet, WalletStatus,
};
use veid_types::error::IdentityError;
use veid_types::keys;

/// Parameters for `CreateIdentityWallet`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct CreateWalletParams {
    /// The Ed25519 key to bind to the wallet.
    pub binding_public_key: Vec<u8>,
    /// Signature by that key over the canonical binding message.
    pub binding_signature: Vec<u8>,
}

/// Response to `CreateIdentityWallet`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct CreateWalletResponse {
    /// The derived wallet id.
    pub wallet_id: [u8; 32],
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `RebindWallet`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RebindWalletParams {
    /// The replacement key.
    pub new_public_key: Vec<u8>,
    /// Signature over the new key by the old binding key.
    pub new_key_signature: Vec<u8>,
    /// Signature by the new key over the canonical binding message.
    pub new_binding_signature: Vec<u8>,
}

/// Response to `RebindWallet`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct RebindWalletResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `AddScopeToWallet`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct AddScopeParams {
    /// The scope to reference.
    pub scope_id: String,
}

/// Parameters for `RevokeScopeFromWallet`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RemoveScopeParams {
    /// The reference to drop.
    pub scope_id: String,
}

/// Response to scope reference changes; carries the recomputed score.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct ScopeRefResponse {
    /// Composite score after the change.
    pub score: u32,
    /// Tier after the change.
    pub tier: Tier,
    /// Height at which the effect is recorded.
    pub height: u64,
}

/// Parameters for `UpdateConsentSettings`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UpdateConsentParams {
    /// The replacement consent flags.
    pub consent: ConsentSettings,
}

/// Response to `UpdateConsentSettings`.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct UpdateConsentResponse {
    /// Height at which the effect is recorded.
    pub height: u64,
}

impl VeidModule {
    pub(crate) fn wallet_key(account: &veid_types::app::AccountId) -> Vec<u8> {
        keys::key1(keys::WALLET_PREFIX, account.as_ref())
    }

    pub(crate) fn load_wallet(
        &self,
        state: &dyn StateAccess,
        account: &veid_types::app::AccountId,
    ) -> Result<Wallet, IdentityError> {
        let wallet = store::get_typed(state, &Self::wallet_key(account))?;
        store::require(wallet, "wallet", account.to_string())
    }

    pub(crate) fn save_wallet(
        &self,
        state: &mut dyn StateAccess,
        wallet: &Wallet,
    ) -> Result<(), IdentityError> {
        store::put_typed(state, &Self::wallet_key(&wallet.account_address), wallet)
    }

    /// Requires the wallet to exist and be Active.
    pub(crate) fn load_active_wallet(
        &self,
        state: &dyn StateAccess,
        account: &veid_types::app::AccountId,
    ) -> Result<Wallet, IdentityError> {
        let wallet = self.load_wallet(state, account)?;
        if wallet.status != WalletStatus::Active {
            return Err(IdentityError::Precondition(format!(
                "wallet for {} is not active",
                account
            )));
        }
        Ok(wallet)
    }

    /// Handles `CreateIdentityWallet`.
    ///
    /// The wallet id is a pure function of the address; the binding signature
    /// must verify over the canonical binding message under the supplied key.
    pub fn create_wallet(
        &self,
        state: &mut dyn StateAccess,
        params: CreateWalletParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<CreateWalletResponse, IdentityError> {
        let account = ctx.signer_account_id;
        let key = Self::wallet_key(&account);
        if state.get(&key)?.is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: "wallet",
                id: account.to_string(),
            });
        }

        let wallet_id = wallet_id_for_account(&account);
        let message = binding_message(&wallet_id, &account);
        verify_signature(&params.binding_public_key, &message, &params.binding_signature)?;

        let wallet = Wallet {
            wallet_id,
            account_address: account,
            binding_public_key: params.binding_public_key,
            binding_signature: params.binding_signature,
            status: WalletStatus::Active,
            current_score: 0,
            score_status: ScoreStatus::Unknown,
            tier: Tier::Unverified,
            scope_refs: Vec::new(),
            consent_settings: ConsentSettings::default(),
            derived_features: Vec::new(),
            verification_history: Vec::new(),
            locked: false,
            created_at_height: ctx.block_height,
        };
        self.save_wallet(state, &wallet)?;

        sink.emit(IdentityEvent::WalletCreated {
            account,
            wallet_id,
        });
        Ok(CreateWalletResponse {
            wallet_id,
            height: ctx.block_height,
        })
    }

    /// Handles `RebindWallet`.
    ///
    /// Both signatures must verify: the old key endorses the new key, and the
    /// new key signs the binding message. The old key is erased atomically.
    pub fn rebind_wallet(
        &self,
        state: &mut dyn StateAccess,
        params: RebindWalletParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<RebindWalletResponse, IdentityError> {
        let account = ctx.signer_account_id;
        let mut wallet = self.load_active_wallet(state, &account)?;

        verify_signature(
            &wallet.binding_public_key,
            &params.new_public_key,
            &params.new_key_signature,
        )?;
        let message = binding_message(&wallet.wallet_id, &account);
        verify_signature(&params.new_public_key, &message, &params.new_binding_signature)?;

        wallet.binding_public_key = params.new_public_key;
        wallet.binding_signature = params.new_binding_signature;
        self.save_wallet(state, &wallet)?;

        log::info!("[veid] wallet rebound for {}", account);
        Ok(RebindWalletResponse {
            height: ctx.block_height,
        })
    }

    /// Handles `AddScopeToWallet`.
    pub fn add_scope_to_wallet(
        &self,
        state: &mut dyn StateAccess,
        params: AddScopeParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ScopeRefResponse, IdentityError> {
        let account = ctx.signer_account_id;
        let mut wallet = self.load_active_wallet(state, &account)?;

        let scope_key = keys::key1(keys::SCOPE_PREFIX, params.scope_id.as_bytes());
        let scope: Option<IdentityScope> = store::get_typed(state, &scope_key)?;
        let scope = store::require(scope, "scope", params.scope_id.clone())?;
        if scope.account != account {
            return Err(IdentityError::Unauthorized(format!(
                "scope {} is not owned by {}",
                params.scope_id, account
            )));
        }
        if wallet.scope_refs.iter().any(|r| r.scope_id == params.scope_id) {
            return Err(IdentityError::AlreadyExists {
                entity: "scope reference",
                id: params.scope_id,
            });
        }

        wallet.scope_refs.push(ScopeReference {
            scope_id: scope.scope_id.clone(),
            scope_type: scope.scope_type,
            added_at: ctx.block_time,
        });
        self.save_wallet(state, &wallet)?;

        let wallet = self.update_account_tier(state, &account, sink)?;
        Ok(ScopeRefResponse {
            score: wallet.current_score,
            tier: wallet.tier,
            height: ctx.block_height,
        })
    }

    /// Handles `RevokeScopeFromWallet`: drops the reference and recomputes
    /// the composite score.
    pub fn revoke_scope_from_wallet(
        &self,
        state: &mut dyn StateAccess,
        params: RemoveScopeParams,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<ScopeRefResponse, IdentityError> {
        let account = ctx.signer_account_id;
        let mut wallet = self.load_active_wallet(state, &account)?;

        let before = wallet.scope_refs.len();
        wallet.scope_refs.retain(|r| r.scope_id != params.scope_id);
        if wallet.scope_refs.len() == before {
            return Err(IdentityError::NotFound {
                entity: "scope reference",
                id: params.scope_id,
            });
        }
        self.save_wallet(state, &wallet)?;

        let wallet = self.update_account_tier(state, &account, sink)?;
        Ok(ScopeRefResponse {
            score: wallet.current_score,
            tier: wallet.tier,
            height: ctx.block_height,
        })
    }

    /// Handles `UpdateConsentSettings`.
    pub fn update_consent_settings(
        &self,
        state: &mut dyn StateAccess,
        params: UpdateConsentParams,
        ctx: &TxContext,
        _sink: &mut EventSink,
    ) -> Result<UpdateConsentResponse, IdentityError> {
        let account = ctx.signer_account_id;
        let mut wallet = self.load_active_wallet(state, &account)?;
        wallet.consent_settings = ConsentSettings {
            updated_at: ctx.block_time,
            ..params.consent
        };
        self.save_wallet(state, &wallet)?;
        Ok(UpdateConsentResponse {
            height: ctx.block_height,
        })
    }
}
