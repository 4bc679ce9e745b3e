//! Hash primitives used by the swap protocol.
//!
//! The hashlock committing a session to its preimage is `sha256`, matching
//! the HTLC convention carried over both chain families. `keccak256` is
//! kept alongside it for EVM event-topic hashing, which the source chain's
//! escrow contract uses for its log signatures.

use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data (EVM event topic hashing).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Compute the sha256 hashlock for a 32-byte preimage.
pub fn hashlock(preimage: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(preimage);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Check whether a preimage satisfies a hashlock.
pub fn verify_preimage(preimage: &[u8; 32], expected_hashlock: &[u8; 32]) -> bool {
    &hashlock(preimage) == expected_hashlock
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashlock_roundtrip() {
        let preimage = [7u8; 32];
        let h = hashlock(&preimage);
        assert!(verify_preimage(&preimage, &h));
        assert!(!verify_preimage(&[8u8; 32], &h));
    }

    #[test]
    fn test_keccak256_nonzero() {
        let h = keccak256(b"hello");
        assert_ne!(h, [0u8; 32]);
    }

    #[test]
    fn test_hashlock_deterministic() {
        let preimage = [1u8; 32];
        assert_eq!(hashlock(&preimage), hashlock(&preimage));
    }
}
