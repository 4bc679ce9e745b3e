//! Secret Manager (C1): generates, encrypts, holds, and one-shot-reveals
//! the 32-byte preimages keyed by their hash.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use multichain_rs::hash::hashlock;
use multichain_rs::secret_crypto::SecretCipher;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

use crate::errors::SecretError;

pub(crate) const DEFAULT_LIFETIME_HOURS: i64 = 24;

struct SecretRecord {
    sealed: multichain_rs::secret_crypto::SealedPreimage,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revealed: bool,
}

/// Holds encrypted preimages and enforces at-most-once reveal under
/// concurrent callers. The encryption key is process-scoped: it never
/// leaves this struct and is never logged (wrapped by
/// `multichain_rs::Redacted` wherever it would otherwise appear in a
/// `Debug` impl).
pub struct SecretManager {
    cipher: SecretCipher,
    records: Mutex<HashMap<[u8; 32], SecretRecord>>,
    lifetime: ChronoDuration,
}

impl SecretManager {
    /// Build a manager with a freshly generated process-scoped key.
    pub fn new() -> Self {
        let (_key, cipher) = SecretCipher::generate();
        Self {
            cipher,
            records: Mutex::new(HashMap::new()),
            lifetime: ChronoDuration::hours(DEFAULT_LIFETIME_HOURS),
        }
    }

    pub fn with_lifetime_hours(lifetime_hours: i64) -> Self {
        let (_key, cipher) = SecretCipher::generate();
        Self {
            cipher,
            records: Mutex::new(HashMap::new()),
            lifetime: ChronoDuration::hours(lifetime_hours),
        }
    }

    /// Draw a fresh preimage, compute its hashlock, seal the preimage at
    /// rest, and index the sealed record by hash. Returns the preimage once;
    /// callers must not expect to retrieve it again except via `reveal`.
    pub fn create(&self) -> eyre::Result<([u8; 32], [u8; 32])> {
        let preimage = multichain_rs::secret_crypto::generate_preimage();
        let hash = hashlock(&preimage);
        let sealed = self.cipher.seal(&preimage)?;

        let now = Utc::now();
        let record = SecretRecord {
            sealed,
            created_at: now,
            expires_at: now + self.lifetime,
            revealed: false,
        };

        self.records.lock().expect("poisoned lock").insert(hash, record);
        info!(hash = %multichain_rs::hash::bytes32_to_hex(&hash), "secret created");
        Ok((preimage, hash))
    }

    /// Decrypt and return the preimage for `hash`. Atomically marks the
    /// record revealed; a second call (even concurrent) fails with
    /// `SecretError::AlreadyRevealed`. The mutex serializes all callers so
    /// this holds even under contention.
    pub fn reveal(&self, hash: [u8; 32]) -> Result<[u8; 32], SecretError> {
        let mut records = self.records.lock().expect("poisoned lock");
        let record = records.get_mut(&hash).ok_or(SecretError::NotFound)?;

        if Utc::now() > record.expires_at {
            records.remove(&hash);
            return Err(SecretError::Expired);
        }

        if record.revealed {
            return Err(SecretError::AlreadyRevealed);
        }

        let preimage = self
            .cipher
            .open(&record.sealed)
            .map_err(|_| SecretError::Mismatch)?;
        record.revealed = true;
        Ok(preimage)
    }

    /// Verify a caller-proposed preimage hashes to `hash` without consuming
    /// the reveal slot. Used by chain-event matching, which observes a
    /// preimage on-chain rather than calling `reveal` itself.
    pub fn verify(&self, hash: [u8; 32], preimage: &[u8; 32]) -> Result<(), SecretError> {
        if hashlock(preimage) != hash {
            return Err(SecretError::Mismatch);
        }
        Ok(())
    }

    /// Delete a record; subsequent `reveal` calls fail with `NotFound`.
    pub fn expire(&self, hash: [u8; 32]) {
        self.records.lock().expect("poisoned lock").remove(&hash);
    }

    /// Sweep every record whose expiry has elapsed. Intended to run on a
    /// periodic tick alongside the session store's own TTL sweep.
    pub fn sweep_expired(&self) -> usize {
        let mut records = self.records.lock().expect("poisoned lock");
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, r| r.expires_at > now);
        before - records.len()
    }
}

impl Default for SecretManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_reveal() {
        let manager = SecretManager::new();
        let (preimage, hash) = manager.create().unwrap();
        let revealed = manager.reveal(hash).unwrap();
        assert_eq!(revealed, preimage);
    }

    #[test]
    fn test_second_reveal_fails() {
        let manager = SecretManager::new();
        let (_preimage, hash) = manager.create().unwrap();
        manager.reveal(hash).unwrap();
        let err = manager.reveal(hash).unwrap_err();
        assert!(matches!(err, SecretError::AlreadyRevealed));
    }

    #[test]
    fn test_reveal_unknown_hash_not_found() {
        let manager = SecretManager::new();
        let err = manager.reveal([0u8; 32]).unwrap_err();
        assert!(matches!(err, SecretError::NotFound));
    }

    #[test]
    fn test_expire_then_reveal_not_found() {
        let manager = SecretManager::new();
        let (_preimage, hash) = manager.create().unwrap();
        manager.expire(hash);
        let err = manager.reveal(hash).unwrap_err();
        assert!(matches!(err, SecretError::NotFound));
    }

    #[test]
    fn test_verify_mismatch() {
        let manager = SecretManager::new();
        let (_preimage, hash) = manager.create().unwrap();
        let err = manager.verify(hash, &[9u8; 32]).unwrap_err();
        assert!(matches!(err, SecretError::Mismatch));
    }

    #[test]
    fn test_concurrent_reveal_is_at_most_once() {
        use std::sync::Arc;
        use std::thread;

        let manager = Arc::new(SecretManager::new());
        let (_preimage, hash) = manager.create().unwrap();

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || manager.reveal(hash).is_ok())
            })
            .collect();

        let successes: usize = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(successes, 1);
    }
}
