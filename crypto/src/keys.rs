//! Key management for EMBERNET
//!
//! Handles keypair derivation from secret passphrases and address derivation.
//! A passphrase deterministically yields the same keypair on every node, so
//! wallets never store private keys.

use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use embernet_core::{Address, EmberError, EmberResult, PublicKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::hashing::sha256;

/// A keypair for signing and verification.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: Ed25519SigningKey,
}

impl KeyPair {
    /// Derive a keypair from a secret passphrase.
    ///
    /// The passphrase is hashed with SHA-256 and the hash is used as the
    /// Ed25519 seed. Deterministic: the same secret always yields the same
    /// keypair.
    pub fn from_secret(secret: &str) -> Self {
        let seed = Zeroizing::new(*sha256(secret.as_bytes()).as_bytes());
        let signing_key = Ed25519SigningKey::from_bytes(&seed);
        Self { signing_key }
    }

    /// Create a keypair from raw seed bytes.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = Ed25519SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    /// Get the address derived from the public key.
    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key())
    }

    pub(crate) fn signing_key(&self) -> &Ed25519SigningKey {
        &self.signing_key
    }
}

/// Derive an address from a public key.
///
/// SHA-256 the key bytes, take the low 8 bytes of the digest in reversed
/// byte order, and read them as an unsigned integer. The textual form
/// appends the address suffix character.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let digest = sha256(public_key.as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest.as_bytes()[..8]);
    // Reversed byte order read big-endian equals a little-endian read.
    Address::new(u64::from_le_bytes(low))
}

/// Verify that an address matches a public key.
pub fn verify_address(address: &Address, public_key: &PublicKey) -> bool {
    address_from_public_key(public_key) == *address
}

/// Convert our PublicKey type to an Ed25519 verifying key.
pub fn public_key_to_ed25519(key: &PublicKey) -> EmberResult<Ed25519VerifyingKey> {
    Ed25519VerifyingKey::from_bytes(key.as_bytes()).map_err(|_| EmberError::InvalidPublicKey)
}
