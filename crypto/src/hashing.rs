//! SHA-256 hashing
//!
//! Every canonical encoding in the protocol (transaction ids, signing
//! payloads, address derivation) is hashed with SHA-256.

use embernet_core::Hash;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of data.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash::from_bytes(bytes)
}

/// Hash multiple pieces of data as one stream.
pub fn sha256_parts(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_deterministic() {
        let data = b"Hello, EMBERNET!";
        let hash1 = sha256(data);
        let hash2 = sha256(data);

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, Hash::ZERO);
    }

    #[test]
    fn test_sha256_distinguishes_input() {
        assert_ne!(sha256(b"a"), sha256(b"b"));
    }

    #[test]
    fn test_sha256_parts_matches_concatenation() {
        let joined = sha256(b"Hello, EMBERNET!");
        let parts = sha256_parts(&[b"Hello, ", b"EMBERNET!"]);
        assert_eq!(joined, parts);
    }
}
