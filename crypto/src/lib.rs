//! EMBERNET cryptographic primitives
//!
//! Passphrase-derived Ed25519 keypairs, SHA-256 hashing, and non-faulting
//! signature verification.

pub mod hashing;
pub mod keys;
pub mod signing;

pub use hashing::{sha256, sha256_parts};
pub use keys::{address_from_public_key, verify_address, KeyPair};
pub use signing::{sign, verify};
