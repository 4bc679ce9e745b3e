//! Typed error taxonomy returned across the public API boundary.
//!
//! Every variant carries the stable error-code string callers match on;
//! `code()` is what actually crosses the wire, the `Display` message is for
//! logs and human debugging.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found for hash")]
    NotFound,
    #[error("secret expired")]
    Expired,
    #[error("secret already revealed")]
    AlreadyRevealed,
    #[error("preimage does not hash to the stored key")]
    Mismatch,
}

impl SecretError {
    pub fn code(&self) -> &'static str {
        match self {
            SecretError::NotFound => "SECRET_NOT_FOUND",
            SecretError::Expired => "SECRET_EXPIRED",
            SecretError::AlreadyRevealed => "SECRET_ALREADY_REVEALED",
            SecretError::Mismatch => "SECRET_MISMATCH",
        }
    }
}

#[derive(Debug, Error)]
pub enum TimelockError {
    #[error("base duration and derived deadlines violate ordering invariants")]
    InvalidTimeout,
}

impl TimelockError {
    pub fn code(&self) -> &'static str {
        "INVALID_TIMEOUT"
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain connection failed: {0}")]
    ConnectionFailed(String),
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    #[error("block or transaction not found: {0}")]
    BlockNotFound(String),
}

impl ChainError {
    pub fn code(&self) -> &'static str {
        match self {
            ChainError::ConnectionFailed(_) => "CHAIN_CONNECTION_FAILED",
            ChainError::TransactionFailed(_) => "TRANSACTION_FAILED",
            ChainError::BlockNotFound(_) => "BLOCK_NOT_FOUND",
        }
    }
}

/// Errors surfaced by the coordinator and the public API.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("illegal state transition")]
    InvalidState,
    #[error("session not found")]
    SessionNotFound,
    #[error("active session limit reached")]
    SessionLimitReached,
    #[error("quote unavailable: {0}")]
    QuoteUnavailable(String),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Timelock(#[from] TimelockError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl CoordinatorError {
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::Validation(_) => "VALIDATION_ERROR",
            CoordinatorError::InvalidState => "SESSION_INVALID_STATE",
            CoordinatorError::SessionNotFound => "SESSION_NOT_FOUND",
            CoordinatorError::SessionLimitReached => "SESSION_LIMIT_REACHED",
            CoordinatorError::QuoteUnavailable(_) => "QUOTE_UNAVAILABLE",
            CoordinatorError::Secret(e) => e.code(),
            CoordinatorError::Timelock(e) => e.code(),
            CoordinatorError::Chain(e) => e.code(),
        }
    }
}
