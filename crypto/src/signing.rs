//! Digital signature operations using Ed25519
//!
//! Signatures are produced over the SHA-256 hash of a canonical byte
//! encoding. Verification never faults: malformed keys or signatures
//! degrade to `false` so a hostile payload cannot crash the admission
//! pipeline.

use ed25519_dalek::{Signer, Verifier};
use embernet_core::{Hash, PublicKey, Signature};

use crate::keys::{public_key_to_ed25519, KeyPair};

/// Sign a hash using Ed25519.
pub fn sign(keypair: &KeyPair, hash: &Hash) -> Signature {
    let signature = keypair.signing_key().sign(hash.as_bytes());
    Signature::from_bytes(signature.to_bytes())
}

/// Verify a signature over a hash.
///
/// Returns `false` for any failure, including a public key that is not a
/// valid curve point. Never panics, never propagates an error.
pub fn verify(public_key: &PublicKey, hash: &Hash, signature: &Signature) -> bool {
    let verifying_key = match public_key_to_ed25519(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());

    verifying_key.verify(hash.as_bytes(), &sig).is_ok()
}
