//! Core data model: sessions, their steps, and quotes — everything C6
//! through C10 read and write.

use chrono::{DateTime, Utc};
use multichain_rs::{ChainTag, TxRef};
use serde::{Deserialize, Serialize};

/// One swap attempt end-to-end, owned by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub source_chain: ChainTag,
    pub destination_chain: ChainTag,
    pub source_token: String,
    pub destination_token: String,
    pub source_amount: u128,
    pub destination_amount: u128,
    pub maker: String,
    pub taker: String,
    pub slippage_bps: u16,
    pub hashlock: [u8; 32],
    pub status: SessionStatus,
    pub phase_progress: u8,
    pub deadlines: Deadlines,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_escrow_ref: Option<TxRef>,
    pub destination_escrow_ref: Option<TxRef>,
    pub revealed_secret: Option<[u8; 32]>,
    pub last_error: Option<String>,
    pub authorized: bool,
}

impl Session {
    /// Check the §3 ordering invariants. Called before a session is stored
    /// and whenever its deadlines or revealed secret change.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.deadlines.check_invariants()?;

        if let Some(secret) = self.revealed_secret {
            let computed = multichain_rs::hash::hashlock(&secret);
            if computed != self.hashlock {
                return Err("revealed_secret does not hash to session hashlock".to_string());
            }
        }

        Ok(())
    }
}

/// The five absolute deadlines produced by the timelock calculator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deadlines {
    pub source_withdrawal: DateTime<Utc>,
    pub source_public_withdrawal: DateTime<Utc>,
    pub source_cancellation: DateTime<Utc>,
    pub destination_withdrawal: DateTime<Utc>,
    pub destination_cancellation: DateTime<Utc>,
}

impl Deadlines {
    pub fn check_invariants(&self) -> Result<(), String> {
        if !(self.destination_cancellation < self.source_withdrawal) {
            return Err("destination_cancellation must precede source_withdrawal".to_string());
        }
        if !(self.source_withdrawal <= self.source_public_withdrawal
            && self.source_public_withdrawal < self.source_cancellation)
        {
            return Err(
                "source_withdrawal <= source_public_withdrawal < source_cancellation violated"
                    .to_string(),
            );
        }
        if !(self.destination_withdrawal < self.destination_cancellation) {
            return Err("destination_withdrawal must precede destination_cancellation".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initialized,
    SourceLocking,
    SourceLocked,
    DestinationLocking,
    BothLocked,
    RevealingSecret,
    Completed,
    Cancelling,
    Cancelled,
    Timeout,
    Refunding,
    Refunded,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Cancelled
                | SessionStatus::Refunded
                | SessionStatus::Failed
        )
    }
}

/// One step in a session's ordered progress list, as returned by
/// `get_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStep {
    pub name: String,
    pub status: StepStatus,
    pub tx_ref: Option<TxRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// Read-only projection returned by `create_session`/`get_session`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub status: SessionStatus,
    pub hashlock_hex: String,
    pub deadlines: Deadlines,
    pub steps: Vec<SessionStep>,
    pub last_error: Option<String>,
}

impl From<&Session> for SessionSnapshot {
    fn from(s: &Session) -> Self {
        SessionSnapshot {
            id: s.id.clone(),
            status: s.status,
            hashlock_hex: multichain_rs::hash::bytes32_to_hex(&s.hashlock),
            deadlines: s.deadlines,
            steps: session_steps(s),
            last_error: s.last_error.clone(),
        }
    }
}

fn session_steps(s: &Session) -> Vec<SessionStep> {
    use SessionStatus::*;

    let rank = |status: SessionStatus| -> u8 {
        match status {
            Initialized => 0,
            SourceLocking => 1,
            SourceLocked => 2,
            DestinationLocking => 3,
            BothLocked => 4,
            RevealingSecret => 5,
            Completed => 6,
            Cancelling | Cancelled | Timeout | Refunding | Refunded | Failed => 255,
        }
    };

    let current_rank = rank(s.status);
    let step_at = |name: &str, threshold: u8, tx_ref: Option<TxRef>| SessionStep {
        name: name.to_string(),
        status: if s.status.is_terminal() && s.status != Completed {
            if current_rank >= threshold {
                StepStatus::Done
            } else {
                StepStatus::Failed
            }
        } else if current_rank > threshold {
            StepStatus::Done
        } else if current_rank == threshold {
            StepStatus::InProgress
        } else {
            StepStatus::Pending
        },
        tx_ref,
    };

    vec![
        step_at("lock_source", 1, s.source_escrow_ref.clone()),
        step_at("lock_destination", 3, s.destination_escrow_ref.clone()),
        step_at("reveal", 5, None),
    ]
}

/// Request shape for `create_session`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub source_chain: String,
    pub destination_chain: String,
    pub source_token: String,
    pub destination_token: String,
    pub source_amount: String,
    pub destination_amount: String,
    pub maker: String,
    pub taker: String,
    pub slippage_bps: u16,
    pub base_duration_secs: u64,
}
