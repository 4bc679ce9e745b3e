//! Session Store (C6): in-process mapping of session identifier to session
//! record, with TTL eviction for terminal sessions and a hard cap on active
//! sessions.
//!
//! The only shared mutable structure session state passes through: a
//! single registry lock guards insert/remove, matching the "no singleton
//! leaks outside C6" design note.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::CoordinatorError;
use crate::types::Session;

pub struct SessionStoreConfig {
    pub max_active_sessions: usize,
    pub terminal_grace_period_secs: i64,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_active_sessions: 1000,
            terminal_grace_period_secs: 2 * 60 * 60,
        }
    }
}

pub struct SessionStore {
    config: SessionStoreConfig,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new session, enforcing the unique-hashlock invariant and
    /// the active-session cap. Rejects with `SessionLimitReached` if the
    /// store is at capacity and `session` is not already terminal.
    pub fn put(&self, session: Session) -> Result<(), CoordinatorError> {
        let mut sessions = self.sessions.write().expect("poisoned lock");

        if !sessions.contains_key(&session.id) {
            let active_count = sessions.values().filter(|s| !s.status.is_terminal()).count();
            if active_count >= self.config.max_active_sessions {
                return Err(CoordinatorError::SessionLimitReached);
            }
            if sessions.values().any(|s| s.hashlock == session.hashlock) {
                return Err(CoordinatorError::Validation(
                    "hashlock already in use by another session".to_string(),
                ));
            }
        }

        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().expect("poisoned lock").get(id).cloned()
    }

    pub fn delete(&self, id: &str) -> Option<Session> {
        self.sessions.write().expect("poisoned lock").remove(id)
    }

    /// Snapshot every non-terminal session. Used by the coordinator to
    /// resume driving in-flight sessions and by the monitor to match
    /// incoming events against open hashlocks.
    pub fn iterate_active(&self) -> Vec<Session> {
        self.sessions
            .read()
            .expect("poisoned lock")
            .values()
            .filter(|s| !s.status.is_terminal())
            .cloned()
            .collect()
    }

    pub fn find_by_hashlock(&self, hashlock: &[u8; 32]) -> Option<Session> {
        self.sessions
            .read()
            .expect("poisoned lock")
            .values()
            .find(|s| &s.hashlock == hashlock)
            .cloned()
    }

    /// Purge terminal sessions past the grace period. Returns the number
    /// removed.
    pub fn sweep_expired(&self) -> usize {
        let grace = ChronoDuration::seconds(self.config.terminal_grace_period_secs);
        let now = Utc::now();
        let mut sessions = self.sessions.write().expect("poisoned lock");
        let before = sessions.len();
        sessions.retain(|_, s| !(s.status.is_terminal() && now - s.updated_at > grace));
        before - sessions.len()
    }

    /// Atomic read-modify-write on an existing session. Used by the
    /// coordinator so a transition is never lost to a racing writer.
    pub fn update<F>(&self, id: &str, f: F) -> Result<Session, CoordinatorError>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.sessions.write().expect("poisoned lock");
        let session = sessions
            .get_mut(id)
            .ok_or(CoordinatorError::SessionNotFound)?;
        f(session);
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .expect("poisoned lock")
            .values()
            .filter(|s| !s.status.is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Deadlines, SessionStatus};
    use chrono::Utc;

    fn sample_session(id: &str, hashlock: [u8; 32]) -> Session {
        let now = Utc::now();
        Session {
            id: id.to_string(),
            source_chain: multichain_rs::ChainTag::Source,
            destination_chain: multichain_rs::ChainTag::Destination,
            source_token: "ETH".to_string(),
            destination_token: "LUNA".to_string(),
            source_amount: 1_000_000_000,
            destination_amount: 1_000_000_000,
            maker: "0xmaker".to_string(),
            taker: "terra1taker".to_string(),
            slippage_bps: 100,
            hashlock,
            status: SessionStatus::Initialized,
            phase_progress: 0,
            deadlines: Deadlines {
                source_withdrawal: now + ChronoDuration::seconds(3600),
                source_public_withdrawal: now + ChronoDuration::seconds(4200),
                source_cancellation: now + ChronoDuration::seconds(6000),
                destination_withdrawal: now + ChronoDuration::seconds(1800),
                destination_cancellation: now + ChronoDuration::seconds(1900),
            },
            created_at: now,
            updated_at: now,
            source_escrow_ref: None,
            destination_escrow_ref: None,
            revealed_secret: None,
            last_error: None,
            authorized: false,
        }
    }

    #[test]
    fn test_put_and_get() {
        let store = SessionStore::new(SessionStoreConfig::default());
        let session = sample_session("s1", [1u8; 32]);
        store.put(session.clone()).unwrap();
        assert_eq!(store.get("s1").unwrap().id, "s1");
    }

    #[test]
    fn test_duplicate_hashlock_rejected() {
        let store = SessionStore::new(SessionStoreConfig::default());
        store.put(sample_session("s1", [2u8; 32])).unwrap();
        let err = store.put(sample_session("s2", [2u8; 32])).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_cap_reached_rejects_new_session() {
        let store = SessionStore::new(SessionStoreConfig {
            max_active_sessions: 1,
            ..SessionStoreConfig::default()
        });
        store.put(sample_session("s1", [3u8; 32])).unwrap();
        let err = store.put(sample_session("s2", [4u8; 32])).unwrap_err();
        assert_eq!(err.code(), "SESSION_LIMIT_REACHED");
    }

    #[test]
    fn test_update_applies_mutation_and_bumps_updated_at() {
        let store = SessionStore::new(SessionStoreConfig::default());
        let session = sample_session("s1", [6u8; 32]);
        let original_updated_at = session.updated_at;
        store.put(session).unwrap();
        let updated = store
            .update("s1", |s| s.status = SessionStatus::SourceLocked)
            .unwrap();
        assert_eq!(updated.status, SessionStatus::SourceLocked);
        assert!(updated.updated_at >= original_updated_at);
        assert_eq!(store.get("s1").unwrap().status, SessionStatus::SourceLocked);
    }

    #[test]
    fn test_update_missing_session_not_found() {
        let store = SessionStore::new(SessionStoreConfig::default());
        let err = store.update("missing", |_| {}).unwrap_err();
        assert_eq!(err.code(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_sweep_expired_removes_old_terminal_sessions() {
        let store = SessionStore::new(SessionStoreConfig {
            terminal_grace_period_secs: 0,
            ..SessionStoreConfig::default()
        });
        let mut session = sample_session("s1", [5u8; 32]);
        session.status = SessionStatus::Completed;
        session.updated_at = Utc::now() - ChronoDuration::seconds(1);
        store.put(session).unwrap();
        let removed = store.sweep_expired();
        assert_eq!(removed, 1);
        assert!(store.get("s1").is_none());
    }
}
