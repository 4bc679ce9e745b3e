//! Shared chain-parameterized primitives for the atomic-swap orchestrator.
//!
//! This crate carries the pieces that are the same no matter which two
//! chains a swap runs between: address/hash codecs, secret-lifecycle
//! cryptography, and one adapter module per chain family. The orchestrator
//! binary depends on this crate and never talks to `alloy` or `cosmrs`
//! directly.

pub mod address_codec;
pub mod hash;
pub mod redact;
pub mod secret_crypto;
pub mod types;

#[cfg(feature = "evm")]
pub mod evm;

#[cfg(feature = "terra")]
pub mod terra;

#[cfg(feature = "testing")]
pub mod testing;

pub use redact::Redacted;
pub use types::{ChainTag, TxRef, TxStatus};
