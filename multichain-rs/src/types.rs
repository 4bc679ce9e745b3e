//! Chain-agnostic value types shared by every adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which chain family a value belongs to.
///
/// The orchestrator is deliberately two-chain (source/destination); this
/// tag disambiguates values that travel between adapters and the
/// coordinator rather than encoding an open-ended chain registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainTag {
    Source,
    Destination,
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainTag::Source => write!(f, "source"),
            ChainTag::Destination => write!(f, "destination"),
        }
    }
}

impl ChainTag {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "source" => Some(ChainTag::Source),
            "destination" => Some(ChainTag::Destination),
            _ => None,
        }
    }
}

/// Opaque transaction reference returned by a chain adapter write.
///
/// Carries enough to look the transaction back up (`tx_status`) without
/// leaking chain-specific types (an EVM tx hash, a Terra tx hash) into the
/// coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef(pub String);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a previously submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Included { height: u64 },
    Finalized { height: u64 },
    Failed { reason: String },
}

/// A decoded on-chain event relevant to the swap protocol, uniform across
/// chain families. The coordinator matches these on `hashlock`; it never
/// inspects chain-specific log shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub chain: ChainTag,
    pub height: u64,
    pub log_index: u64,
    pub hashlock: [u8; 32],
    pub kind: ChainEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEventKind {
    EscrowLocked { escrow_ref: String },
    SecretRevealed { preimage: [u8; 32] },
    Refunded,
}

/// An opaque key that makes a chain write idempotent: repeated submissions
/// with the same key must return the same `TxRef` rather than double-spend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionKey(pub String);

impl ActionKey {
    pub fn new(session_id: &str, phase: &str) -> Self {
        Self(format!("{session_id}:{phase}"))
    }
}
