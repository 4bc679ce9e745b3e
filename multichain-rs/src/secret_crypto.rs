//! Preimage generation and at-rest encryption for the Secret Manager.
//!
//! The Secret Manager (C1) never stores a preimage in plaintext: a
//! process-scoped AEAD key, supplied at startup (optionally from a
//! credential vault), wraps every preimage before it is indexed by its
//! hashlock.

use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use eyre::{eyre, Result};
use rand::RngCore;

/// A sealed preimage: nonce + ciphertext, ready to hold in a secret record.
#[derive(Clone)]
pub struct SealedPreimage {
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

/// Process-scoped symmetric key wrapping preimages at rest.
pub struct SecretCipher {
    cipher: ChaCha20Poly1305,
}

impl SecretCipher {
    /// Build from a 32-byte key (from config or a credential vault).
    pub fn new(key_bytes: &[u8; 32]) -> Self {
        let key = Key::from_slice(key_bytes);
        Self {
            cipher: ChaCha20Poly1305::new(key),
        }
    }

    /// Generate a fresh random process key (used when no vault is configured).
    pub fn generate() -> ([u8; 32], Self) {
        let mut key_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut key_bytes);
        let cipher = Self::new(&key_bytes);
        (key_bytes, cipher)
    }

    pub fn seal(&self, preimage: &[u8; 32]) -> Result<SealedPreimage> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, preimage.as_slice())
            .map_err(|_| eyre!("failed to seal preimage"))?;
        Ok(SealedPreimage {
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    pub fn open(&self, sealed: &SealedPreimage) -> Result<[u8; 32]> {
        let nonce = Nonce::from_slice(&sealed.nonce);
        let plaintext = self
            .cipher
            .decrypt(nonce, sealed.ciphertext.as_slice())
            .map_err(|_| eyre!("failed to open sealed preimage"))?;
        if plaintext.len() != 32 {
            return Err(eyre!("unsealed preimage has wrong length"));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&plaintext);
        Ok(out)
    }
}

/// Draw 32 cryptographically strong random bytes for a new preimage.
pub fn generate_preimage() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let (_key, cipher) = SecretCipher::generate();
        let preimage = generate_preimage();
        let sealed = cipher.seal(&preimage).unwrap();
        let recovered = cipher.open(&sealed).unwrap();
        assert_eq!(preimage, recovered);
    }

    #[test]
    fn test_wrong_key_fails() {
        let (_key, cipher_a) = SecretCipher::generate();
        let (_key2, cipher_b) = SecretCipher::generate();
        let preimage = generate_preimage();
        let sealed = cipher_a.seal(&preimage).unwrap();
        assert!(cipher_b.open(&sealed).is_err());
    }

    #[test]
    fn test_generate_preimage_not_all_zero() {
        let p = generate_preimage();
        assert_ne!(p, [0u8; 32]);
    }
}
