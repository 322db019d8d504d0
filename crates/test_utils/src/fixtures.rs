//! Deterministic fixtures for reproducible tests.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use veid_api::transaction::TxContext;
use veid_types::app::{account_id_from_public_key, sha256, AccountId};

/// A deterministic Ed25519 signer derived from a one-byte seed.
pub struct TestSigner {
    key: SigningKey,
    /// The account derived from the signer's public key.
    pub account: AccountId,
}

impl TestSigner {
    /// Creates the signer for `seed`. The same seed always yields the same
    /// key and account.
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let account = account_id_from_public_key(key.verifying_key().as_bytes())
            .expect("32-byte key always derives an account");
        Self { key, account }
    }

    /// The raw public key bytes.
    pub fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().as_bytes().to_vec()
    }

    /// The verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Signs a message under the module's convention: messages that are not
    /// 32 bytes are reduced with SHA-256 first.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sig = if message.len() == 32 {
            self.key.sign(message)
        } else {
            self.key.sign(&sha256(message))
        };
        sig.to_bytes().to_vec()
    }
}

/// The account for a one-byte seed, without keeping the signer around.
pub fn account(seed: u8) -> AccountId {
    TestSigner::new(seed).account
}

/// A context at the given height, timed at 6 seconds per block from a fixed
/// genesis time.
pub fn test_context(height: u64, signer: AccountId) -> TxContext {
    TxContext {
        block_height: height,
        block_time: 1_700_000_000 + height * 6,
        chain_id: 7,
        signer_account_id: signer,
    }
}
