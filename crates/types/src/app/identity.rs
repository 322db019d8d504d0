//! The canonical `AccountId`, the deterministic id-derivation helpers and the
//! single signature-verification routine used across the module.
//!
//! Every hash in the system is domain-separated so that ids from different
//! entity kinds can never collide, and every replica derives byte-identical
//! ids from the same inputs.

use crate::error::IdentityError;
use ed25519_dalek::{Signature, VerifyingKey};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A unique, stable identifier for an on-chain account, derived from the hash
/// of a public key. Represented as a 32-byte array.
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Default,
    Hash,
)]
pub struct AccountId(pub [u8; 32]);

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(hash: [u8; 32]) -> Self {
        Self(hash)
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Computes SHA-256 over `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes a domain-separated SHA-256 over the concatenation of `parts`.
///
/// This is the single source of truth for every derived identifier in the
/// module (wallet ids, appeal ids, delegation ids, verification hashes).
pub fn domain_hash(domain: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derives a canonical `AccountId` from a raw Ed25519 public key.
pub fn account_id_from_public_key(public_key: &[u8]) -> Result<AccountId, IdentityError> {
    if public_key.len() != 32 {
        return Err(IdentityError::InvalidAddress(format!(
            "public key must be 32 bytes, got {}",
            public_key.len()
        )));
    }
    Ok(AccountId(domain_hash(b"VEID-ACCOUNT-ID::V1", &[public_key])))
}

/// Derives the wallet id for an account. A pure function of the address.
pub fn wallet_id_for_account(account: &AccountId) -> [u8; 32] {
    domain_hash(b"VEID-WALLET-ID::V1", &[account.as_ref()])
}

/// Builds the canonical binding message a wallet's binding key must sign.
pub fn binding_message(wallet_id: &[u8; 32], account: &AccountId) -> Vec<u8> {
    let mut msg = b"VEID-WALLET-BINDING::V1".to_vec();
    msg.extend_from_slice(wallet_id);
    msg.extend_from_slice(account.as_ref());
    msg
}

/// Verifies an Ed25519 signature over `message`.
///
/// When the message is not exactly 32 bytes it is reduced with SHA-256 first,
/// then verified; 32-byte messages are verified as-is. `verify_strict` is
/// used so that malleable signatures are rejected identically on every
/// replica.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), IdentityError> {
    let pk_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| IdentityError::InvalidSignature("public key must be 32 bytes".into()))?;
    let pk = VerifyingKey::from_bytes(&pk_bytes)
        .map_err(|e| IdentityError::InvalidSignature(format!("malformed public key: {}", e)))?;
    let sig = Signature::from_slice(signature)
        .map_err(|e| IdentityError::InvalidSignature(format!("malformed signature: {}", e)))?;

    let result = if message.len() == 32 {
        pk.verify_strict(message, &sig)
    } else {
        pk.verify_strict(&sha256(message), &sig)
    };
    result.map_err(|_| IdentityError::InvalidSignature("signature verification failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signer(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    #[test]
    fn account_id_is_deterministic() {
        let pk = signer(1).verifying_key();
        let a = account_id_from_public_key(pk.as_bytes()).unwrap();
        let b = account_id_from_public_key(pk.as_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wallet_id_is_pure_function_of_address() {
        let account = AccountId([7; 32]);
        assert_eq!(wallet_id_for_account(&account), wallet_id_for_account(&account));
        assert_ne!(
            wallet_id_for_account(&account),
            wallet_id_for_account(&AccountId([8; 32]))
        );
    }

    #[test]
    fn long_messages_are_hashed_before_verification() {
        let sk = signer(2);
        let message = b"a message that is definitely not thirty-two bytes long";
        let sig = sk.sign(&sha256(message));
        verify_signature(sk.verifying_key().as_bytes(), message, &sig.to_bytes()).unwrap();
    }

    #[test]
    fn wrong_key_fails_verification() {
        let sk = signer(3);
        let message = [9u8; 32];
        let sig = sk.sign(&message);
        let other = signer(4).verifying_key();
        assert!(verify_signature(other.as_bytes(), &message, &sig.to_bytes()).is_err());
    }
}
