//! Cross-Chain Coordinator (C8): drives a session through its phases by
//! calling the chain adapters (C4) and reacting to the event monitor (C5).
//!
//! Modeled as the teacher's watcher/writer tasks are: a cooperative loop
//! with explicit suspension points (chain write, matching event, timer),
//! no unstructured concurrency, and state transitions that always run
//! through C7 before anything else observes them. One `Coordinator` is
//! shared by every session driver task; `drive` is spawned once per
//! session by `main`, keyed on the session id.

use chrono::{DateTime, Utc};
use multichain_rs::types::{ActionKey, ChainEvent, ChainEventKind, ChainTag};
use multichain_rs::{TxRef, TxStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::chain::{ChainAdapter, LockParams};
use crate::errors::CoordinatorError;
use crate::notifier::{Channel, Notifier, PushMessage};
use crate::retry::{with_retry, CircuitBreaker, CircuitBreakerConfig, RetryConfig};
use crate::secret::SecretManager;
use crate::state_machine::validate_transition;
use crate::store::SessionStore;
use crate::types::{Session, SessionStatus};

/// How often a phase that's blocked on an external event re-checks the
/// session record for an out-of-band transition (an API-issued cancel).
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Events the coordinator reacts to beyond its own writes. Delivered by
/// `main`'s per-chain dispatcher, which routes `MonitorEvent::Chain` to the
/// session whose hashlock matches and fans `MonitorEvent::Reorg` out to
/// every session driver on that chain.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Chain(ChainEvent),
    Reorg { chain: ChainTag, from_height: u64 },
}

enum Wait {
    Matched(ChainEvent),
    Deadline,
    ExternalTransition(SessionStatus),
    ChannelClosed,
}

pub struct Coordinator {
    store: Arc<SessionStore>,
    secrets: Arc<SecretManager>,
    notifier: Arc<Notifier>,
    source_adapter: Arc<dyn ChainAdapter>,
    destination_adapter: Arc<dyn ChainAdapter>,
    retry: RetryConfig,
    source_breaker: Mutex<CircuitBreaker>,
    destination_breaker: Mutex<CircuitBreaker>,
}

impl Coordinator {
    pub fn new(
        store: Arc<SessionStore>,
        secrets: Arc<SecretManager>,
        notifier: Arc<Notifier>,
        source_adapter: Arc<dyn ChainAdapter>,
        destination_adapter: Arc<dyn ChainAdapter>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            secrets,
            notifier,
            source_adapter,
            destination_adapter,
            retry,
            source_breaker: Mutex::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
            destination_breaker: Mutex::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
        }
    }

    /// Drive one session to a terminal state. Spawned as its own task by
    /// `main` for every session entering the store; exits once the session
    /// is terminal or disappears from the store.
    pub async fn drive(self: Arc<Self>, session_id: String, mut events: mpsc::Receiver<SessionEvent>) {
        loop {
            let session = match self.store.get(&session_id) {
                Some(s) => s,
                None => return,
            };
            if session.status.is_terminal() {
                return;
            }

            let result = match session.status {
                SessionStatus::Initialized => self.phase_initialized(&session_id, &mut events).await,
                SessionStatus::SourceLocking => self.phase_source_locking(&session_id, &mut events).await,
                SessionStatus::SourceLocked => self.phase_source_locked(&session_id).await,
                SessionStatus::DestinationLocking => {
                    self.phase_destination_locking(&session_id, &mut events).await
                }
                SessionStatus::BothLocked => self.phase_both_locked(&session_id).await,
                SessionStatus::RevealingSecret => self.phase_revealing_secret(&session_id).await,
                SessionStatus::Timeout => self.phase_timeout(&session_id).await,
                SessionStatus::Refunding => self.phase_refunding(&session_id).await,
                SessionStatus::Cancelling => self.phase_cancelling(&session_id).await,
                terminal => {
                    debug_assert!(terminal.is_terminal());
                    return;
                }
            };

            if let Err(e) = result {
                error!(session_id = %session_id, error = %e, "coordinator phase failed, marking session failed");
                let _ = self.fail_session(&session_id, &e.to_string());
                return;
            }
        }
    }

    /// Request cancellation. Only legal from `initialized`/`source_locking`
    /// per §4.8; any other state returns `SESSION_INVALID_STATE` and the
    /// session continues on its normal path, exactly as §5 specifies.
    pub fn request_cancel(&self, session_id: &str) -> Result<Session, CoordinatorError> {
        self.transition(session_id, SessionStatus::Cancelling)
    }

    /// Attach caller authorization to a passively-created session so the
    /// coordinator's `phase_initialized` wait resolves.
    pub fn authorize(&self, session_id: &str) -> Result<Session, CoordinatorError> {
        self.store.update(session_id, |s| s.authorized = true)
    }

    fn transition(&self, session_id: &str, to: SessionStatus) -> Result<Session, CoordinatorError> {
        let current = self
            .store
            .get(session_id)
            .ok_or(CoordinatorError::SessionNotFound)?
            .status;
        validate_transition(current, to)?;
        let session = self.store.update(session_id, |s| s.status = to)?;
        info!(session_id, from = ?current, to = ?to, "session transitioned");
        self.broadcast(&session);
        Ok(session)
    }

    fn broadcast(&self, session: &Session) {
        self.notifier.publish(
            Channel::Session,
            &session.id,
            PushMessage::SessionUpdate {
                session_id: session.id.clone(),
                status: format!("{:?}", session.status).to_lowercase(),
                progress: session.phase_progress,
            },
        );
    }

    fn alert(&self, session_id: &str, message: &str) {
        warn!(session_id, message, "coordinator alert");
        self.notifier.publish(
            Channel::Alerts,
            "",
            PushMessage::Alert {
                session_id: Some(session_id.to_string()),
                message: message.to_string(),
            },
        );
    }

    fn fail_session(&self, session_id: &str, reason: &str) -> Result<Session, CoordinatorError> {
        self.alert(session_id, reason);
        let session = self.store.update(session_id, |s| {
            s.status = SessionStatus::Failed;
            s.last_error = Some(reason.to_string());
        })?;
        self.broadcast(&session);
        Ok(session)
    }

    // ---- phase handlers -------------------------------------------------

    /// `initialized`: wait for `execute()` to attach authorization, a
    /// cancel request, or the source-cancellation deadline (fallback to
    /// `failed`, since `initialized` has no `timeout` edge).
    async fn phase_initialized(
        &self,
        session_id: &str,
        _events: &mut mpsc::Receiver<SessionEvent>,
    ) -> eyre::Result<()> {
        let deadline = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?.deadlines.source_cancellation;

        loop {
            let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;
            if session.status != SessionStatus::Initialized {
                return Ok(());
            }
            if session.authorized {
                self.transition(session_id, SessionStatus::SourceLocking)?;
                return Ok(());
            }
            if Utc::now() >= deadline {
                self.fail_session(session_id, "authorization never arrived before source cancellation deadline")?;
                return Ok(());
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL.min(to_std(deadline - Utc::now()))).await;
        }
    }

    /// `source_locking`: submit the source lock (idempotent by action
    /// key) and wait for the matching on-chain confirmation before moving
    /// to `source_locked`.
    async fn phase_source_locking(
        &self,
        session_id: &str,
        events: &mut mpsc::Receiver<SessionEvent>,
    ) -> eyre::Result<()> {
        let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;

        if session.source_escrow_ref.is_none() {
            let params = build_lock_params(&session, ChainTag::Source);
            let action_key = ActionKey::new(session_id, "lock_source");
            match self
                .retry_write(&self.source_adapter, &self.source_breaker, "source", action_key, |adapter, key| {
                    let hashlock = session.hashlock;
                    let params = params.clone();
                    async move { adapter.lock(key, hashlock, params).await }
                })
                .await
            {
                Ok(tx_ref) => {
                    self.store.update(session_id, |s| s.source_escrow_ref = Some(tx_ref))?;
                }
                Err(e) => {
                    self.transition(session_id, SessionStatus::Failed)?;
                    return Err(e);
                }
            }
        }

        let hashlock = session.hashlock;
        let deadline = session.deadlines.source_cancellation;
        match self
            .wait_for(session_id, events, deadline, SessionStatus::SourceLocking, move |e| {
                e.chain == ChainTag::Source && e.hashlock == hashlock && matches!(e.kind, ChainEventKind::EscrowLocked { .. })
            })
            .await
        {
            Wait::Matched(_) => {
                self.transition(session_id, SessionStatus::SourceLocked)?;
            }
            Wait::Deadline => {
                // No `source_locking -> timeout` edge: the source escrow
                // was never confirmed, so there is nothing yet to refund.
                self.fail_session(session_id, "source lock never confirmed before deadline")?;
            }
            Wait::ExternalTransition(_) | Wait::ChannelClosed => {}
        }
        Ok(())
    }

    /// `source_locked`: either the destination window has already closed
    /// (go straight to `timeout`) or move on to `destination_locking`.
    async fn phase_source_locked(&self, session_id: &str) -> eyre::Result<()> {
        let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;
        if Utc::now() >= session.deadlines.destination_cancellation {
            self.transition(session_id, SessionStatus::Timeout)?;
        } else {
            self.transition(session_id, SessionStatus::DestinationLocking)?;
        }
        Ok(())
    }

    /// `destination_locking`: submit the destination lock and wait for
    /// its confirmation, racing the destination-cancellation deadline.
    async fn phase_destination_locking(
        &self,
        session_id: &str,
        events: &mut mpsc::Receiver<SessionEvent>,
    ) -> eyre::Result<()> {
        let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;

        if session.destination_escrow_ref.is_none() {
            let params = build_lock_params(&session, ChainTag::Destination);
            let action_key = ActionKey::new(session_id, "lock_destination");
            match self
                .retry_write(
                    &self.destination_adapter,
                    &self.destination_breaker,
                    "destination",
                    action_key,
                    |adapter, key| {
                        let hashlock = session.hashlock;
                        let params = params.clone();
                        async move { adapter.lock(key, hashlock, params).await }
                    },
                )
                .await
            {
                Ok(tx_ref) => {
                    self.store.update(session_id, |s| s.destination_escrow_ref = Some(tx_ref))?;
                }
                Err(e) => {
                    self.transition(session_id, SessionStatus::Failed)?;
                    return Err(e);
                }
            }
        }

        let hashlock = session.hashlock;
        let deadline = session.deadlines.destination_cancellation;
        match self
            .wait_for(session_id, events, deadline, SessionStatus::DestinationLocking, move |e| {
                e.chain == ChainTag::Destination
                    && e.hashlock == hashlock
                    && matches!(e.kind, ChainEventKind::EscrowLocked { .. })
            })
            .await
        {
            Wait::Matched(_) => {
                self.transition(session_id, SessionStatus::BothLocked)?;
            }
            Wait::Deadline => {
                self.transition(session_id, SessionStatus::Timeout)?;
            }
            Wait::ExternalTransition(_) | Wait::ChannelClosed => {}
        }
        Ok(())
    }

    /// `both_locked`: move to `revealing_secret` unless the destination
    /// cancellation window has already elapsed.
    async fn phase_both_locked(&self, session_id: &str) -> eyre::Result<()> {
        let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;
        if Utc::now() >= session.deadlines.destination_cancellation {
            self.transition(session_id, SessionStatus::Timeout)?;
        } else {
            self.transition(session_id, SessionStatus::RevealingSecret)?;
        }
        Ok(())
    }

    /// `revealing_secret`: the critical two-step of the whole protocol.
    /// Destination reveal always precedes source reveal. Once the
    /// destination reveal finalizes, the swap is protocol-complete even if
    /// the source reveal subsequently fails — see the Open Question
    /// decision in `SPEC_FULL.md` §7.1.
    async fn phase_revealing_secret(&self, session_id: &str) -> eyre::Result<()> {
        let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;

        let preimage = match session.revealed_secret {
            Some(p) => p,
            None => match self.secrets.reveal(session.hashlock) {
                Ok(p) => {
                    self.store.update(session_id, |s| s.revealed_secret = Some(p))?;
                    p
                }
                Err(e) => {
                    self.transition(session_id, SessionStatus::Failed)?;
                    return Err(eyre::eyre!("secret reveal failed: {}", e.code()));
                }
            },
        };

        let destination_key = ActionKey::new(session_id, "reveal_destination");
        let destination_result = self
            .retry_write(
                &self.destination_adapter,
                &self.destination_breaker,
                "destination",
                destination_key,
                |adapter, key| {
                    let hashlock = session.hashlock;
                    async move { adapter.reveal(key, hashlock, preimage).await }
                },
            )
            .await;

        let destination_tx_ref = match destination_result {
            Ok(tx_ref) => tx_ref,
            Err(e) => {
                self.transition(session_id, SessionStatus::Failed)?;
                return Err(e);
            }
        };
        if let Err(e) = self.wait_for_finalized(&self.destination_adapter, &destination_tx_ref).await {
            self.transition(session_id, SessionStatus::Failed)?;
            return Err(e);
        }

        let source_key = ActionKey::new(session_id, "reveal_source");
        let source_result = self
            .retry_write(&self.source_adapter, &self.source_breaker, "source", source_key, |adapter, key| {
                let hashlock = session.hashlock;
                async move { adapter.reveal(key, hashlock, preimage).await }
            })
            .await;

        // Per §4.8's critical rule: the destination reveal already
        // finalized, so the preimage is public and the swap is
        // protocol-complete regardless of what happens to the source
        // reveal from here on — failure to submit *or* to finalize is
        // recorded and alerted, never rolled back.
        match source_result {
            Ok(tx_ref) => {
                if let Err(e) = self.wait_for_finalized(&self.source_adapter, &tx_ref).await {
                    self.alert(
                        session_id,
                        &format!(
                            "destination reveal finalized but source reveal never finalized: {e}; preimage is \
                             now public, funds remain claimable by whoever holds it"
                        ),
                    );
                    self.store.update(session_id, |s| s.last_error = Some(e.to_string()))?;
                }
            }
            Err(e) => {
                self.alert(
                    session_id,
                    &format!(
                        "destination reveal finalized but source reveal failed: {e}; preimage is now public, \
                         funds remain claimable by whoever holds it"
                    ),
                );
                self.store.update(session_id, |s| s.last_error = Some(e.to_string()))?;
            }
        }

        self.transition(session_id, SessionStatus::Completed)?;
        Ok(())
    }

    /// Poll `tx_status` until the reveal transaction finalizes, per §4.8
    /// steps 4-5's "wait for finalized inclusion". Mirrors `wait_for`'s
    /// poll cadence but has no deadline of its own — a reveal is only
    /// attempted once its phase's other preconditions are already met, and
    /// a stuck finalization surfaces through the normal retry/circuit
    /// breaker machinery on the adapter's read path rather than a second
    /// timeout axis the spec doesn't define for this step.
    async fn wait_for_finalized(&self, adapter: &Arc<dyn ChainAdapter>, tx_ref: &TxRef) -> eyre::Result<()> {
        loop {
            match adapter.tx_status(tx_ref).await {
                Ok(TxStatus::Finalized { .. }) => return Ok(()),
                Ok(TxStatus::Failed { reason }) => return Err(eyre::eyre!("transaction failed: {reason}")),
                Ok(TxStatus::Pending) | Ok(TxStatus::Included { .. }) => {
                    tokio::time::sleep(STATUS_POLL_INTERVAL).await;
                }
                Err(e) => {
                    warn!(tx_ref = %tx_ref.0, error = %e, "tx_status read failed while awaiting finalization, retrying");
                    tokio::time::sleep(STATUS_POLL_INTERVAL).await;
                }
            }
        }
    }

    /// `timeout`: the only outgoing edge is `refunding`; the refund phase
    /// itself decides what actually needs refunding.
    async fn phase_timeout(&self, session_id: &str) -> eyre::Result<()> {
        self.transition(session_id, SessionStatus::Refunding)?;
        Ok(())
    }

    /// `refunding`: per §4.8, refund destination first (if locked) after
    /// `destination_cancellation`, then source after `source_cancellation`.
    async fn phase_refunding(&self, session_id: &str) -> eyre::Result<()> {
        let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;

        if session.destination_escrow_ref.is_some() {
            wait_until(session.deadlines.destination_cancellation).await;
            let key = ActionKey::new(session_id, "refund_destination");
            if let Err(e) = self
                .retry_write(&self.destination_adapter, &self.destination_breaker, "destination", key, |adapter, key| {
                    let hashlock = session.hashlock;
                    async move { adapter.refund(key, hashlock).await }
                })
                .await
            {
                self.transition(session_id, SessionStatus::Failed)?;
                return Err(e);
            }
        }

        if session.source_escrow_ref.is_some() {
            wait_until(session.deadlines.source_cancellation).await;
            let key = ActionKey::new(session_id, "refund_source");
            if let Err(e) = self
                .retry_write(&self.source_adapter, &self.source_breaker, "source", key, |adapter, key| {
                    let hashlock = session.hashlock;
                    async move { adapter.refund(key, hashlock).await }
                })
                .await
            {
                self.transition(session_id, SessionStatus::Failed)?;
                return Err(e);
            }
        }

        self.transition(session_id, SessionStatus::Refunded)?;
        Ok(())
    }

    /// `cancelling`: only reachable from `initialized`/`source_locking`, so
    /// at most an unconfirmed source lock could exist; refund it if so.
    async fn phase_cancelling(&self, session_id: &str) -> eyre::Result<()> {
        let session = self.store.get(session_id).ok_or(CoordinatorError::SessionNotFound)?;

        if session.source_escrow_ref.is_some() {
            let key = ActionKey::new(session_id, "refund_source");
            if let Err(e) = self
                .retry_write(&self.source_adapter, &self.source_breaker, "source", key, |adapter, key| {
                    let hashlock = session.hashlock;
                    async move { adapter.refund(key, hashlock).await }
                })
                .await
            {
                self.transition(session_id, SessionStatus::Failed)?;
                return Err(e);
            }
        }

        self.transition(session_id, SessionStatus::Cancelled)?;
        Ok(())
    }

    // ---- shared helpers ---------------------------------------------------

    async fn retry_write<F, Fut>(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        breaker: &Mutex<CircuitBreaker>,
        label: &str,
        action_key: ActionKey,
        mut op: F,
    ) -> eyre::Result<TxRef>
    where
        F: FnMut(Arc<dyn ChainAdapter>, ActionKey) -> Fut,
        Fut: std::future::Future<Output = eyre::Result<TxRef>>,
    {
        {
            let guard = breaker.lock().await;
            if guard.is_open() {
                return Err(eyre::eyre!("{label} chain write circuit breaker open"));
            }
        }

        let adapter = Arc::clone(adapter);
        let result = with_retry(&self.retry, label, || {
            let adapter = Arc::clone(&adapter);
            op(adapter, action_key.clone())
        })
        .await;

        let mut guard = breaker.lock().await;
        match &result {
            Ok(_) => guard.record_success(),
            Err(_) => guard.record_failure(),
        }
        result
    }

    /// Wait for a matching chain event, a reorg notice (logged and
    /// ignored — redelivery after a reorg is idempotent per §7.3 and
    /// matched again on the next loop), the phase deadline, or an
    /// out-of-band status change (an API-issued cancel).
    async fn wait_for(
        &self,
        session_id: &str,
        events: &mut mpsc::Receiver<SessionEvent>,
        deadline: DateTime<Utc>,
        expected_status: SessionStatus,
        matches: impl Fn(&ChainEvent) -> bool,
    ) -> Wait {
        loop {
            let remaining = to_std(deadline - Utc::now());
            tokio::select! {
                _ = tokio::time::sleep(remaining.min(STATUS_POLL_INTERVAL)) => {
                    if Utc::now() >= deadline {
                        return Wait::Deadline;
                    }
                    match self.store.get(session_id) {
                        Some(s) if s.status != expected_status => return Wait::ExternalTransition(s.status),
                        Some(_) => continue,
                        None => return Wait::ChannelClosed,
                    }
                }
                maybe = events.recv() => {
                    match maybe {
                        None => return Wait::ChannelClosed,
                        Some(SessionEvent::Reorg { chain, from_height }) => {
                            info!(session_id, %chain, from_height, "reorg observed, awaiting redelivery");
                        }
                        Some(SessionEvent::Chain(event)) => {
                            if matches(&event) {
                                return Wait::Matched(event);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn to_std(d: chrono::Duration) -> Duration {
    d.to_std().unwrap_or(Duration::from_millis(0))
}

async fn wait_until(deadline: DateTime<Utc>) {
    let remaining = to_std(deadline - Utc::now());
    if remaining > Duration::ZERO {
        tokio::time::sleep(remaining).await;
    }
}

/// Translate a session's deadlines and counterparties into the chain-agnostic
/// `LockParams` for one leg of the swap.
fn build_lock_params(session: &Session, chain: ChainTag) -> LockParams {
    match chain {
        ChainTag::Source => LockParams {
            token: session.source_token.clone(),
            amount: session.source_amount.to_string(),
            counterparty: session.taker.clone(),
            withdrawal_time: session.deadlines.source_withdrawal.timestamp() as u64,
            public_withdrawal_time: session.deadlines.source_public_withdrawal.timestamp() as u64,
            cancellation_time: session.deadlines.source_cancellation.timestamp() as u64,
        },
        ChainTag::Destination => LockParams {
            token: session.destination_token.clone(),
            amount: session.destination_amount.to_string(),
            counterparty: session.maker.clone(),
            withdrawal_time: session.deadlines.destination_withdrawal.timestamp() as u64,
            public_withdrawal_time: session.deadlines.destination_withdrawal.timestamp() as u64,
            cancellation_time: session.deadlines.destination_cancellation.timestamp() as u64,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainAdapter;
    use crate::timelock::{compute_deadlines, TimelockConfig};
    use multichain_rs::testing::MockChain;

    fn new_session(id: &str, hashlock: [u8; 32]) -> Session {
        let now = Utc::now();
        let deadlines = compute_deadlines(&TimelockConfig::default(), 3600, now).unwrap();
        Session {
            id: id.to_string(),
            source_chain: ChainTag::Source,
            destination_chain: ChainTag::Destination,
            source_token: "0xtoken".to_string(),
            destination_token: "uluna".to_string(),
            source_amount: 1_000_000_000,
            destination_amount: 1_000_000_000,
            maker: "0xmaker".to_string(),
            taker: "terra1taker".to_string(),
            slippage_bps: 100,
            hashlock,
            status: SessionStatus::Initialized,
            phase_progress: 0,
            deadlines,
            created_at: now,
            updated_at: now,
            source_escrow_ref: None,
            destination_escrow_ref: None,
            revealed_secret: None,
            last_error: None,
            authorized: true,
        }
    }

    fn setup() -> (Arc<Coordinator>, Arc<MockChainAdapter>, Arc<MockChainAdapter>, Arc<SessionStore>, Arc<SecretManager>) {
        let store = Arc::new(SessionStore::new(crate::store::SessionStoreConfig::default()));
        let secrets = Arc::new(SecretManager::new());
        let notifier = Arc::new(Notifier::new());
        let source = Arc::new(MockChainAdapter::new(MockChain::new(ChainTag::Source)));
        let destination = Arc::new(MockChainAdapter::new(MockChain::new(ChainTag::Destination)));
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&store),
            Arc::clone(&secrets),
            notifier,
            Arc::clone(&source) as Arc<dyn ChainAdapter>,
            Arc::clone(&destination) as Arc<dyn ChainAdapter>,
            RetryConfig {
                max_retries: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
                backoff_multiplier: 2.0,
            },
        ));
        (coordinator, source, destination, store, secrets)
    }

    #[tokio::test]
    async fn test_happy_path_reaches_completed() {
        let (coordinator, source, destination, store, secrets) = setup();
        let (_preimage, hash) = secrets.create().unwrap();
        let session = new_session("s1", hash);
        store.put(session).unwrap();

        let (tx, rx) = mpsc::channel(16);
        let driver = tokio::spawn(coordinator.clone().drive("s1".to_string(), rx));

        // Give the driver a moment to submit the source lock, then forward
        // back the very event its own `lock()` call just emitted.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let source_height = source.chain().current_height();
        for event in source.chain().get_logs(0, source_height) {
            tx.send(SessionEvent::Chain(event)).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        let destination_height = destination.chain().current_height();
        for event in destination.chain().get_logs(0, destination_height) {
            tx.send(SessionEvent::Chain(event)).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(2), driver).await.unwrap().unwrap();

        let final_session = store.get("s1").unwrap();
        assert_eq!(final_session.status, SessionStatus::Completed);
        assert!(final_session.revealed_secret.is_some());
    }

    #[tokio::test]
    async fn test_illegal_cancel_from_both_locked_rejected() {
        let (coordinator, _source, _destination, store, secrets) = setup();
        let (_preimage, hash) = secrets.create().unwrap();
        let mut session = new_session("s2", hash);
        session.status = SessionStatus::BothLocked;
        store.put(session).unwrap();

        let err = coordinator.request_cancel("s2").unwrap_err();
        assert_eq!(err.code(), "SESSION_INVALID_STATE");
        assert_eq!(store.get("s2").unwrap().status, SessionStatus::BothLocked);
    }
}
