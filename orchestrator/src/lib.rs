//! Off-chain coordinator for HTLC-based cross-chain atomic swaps between an
//! EVM source chain and a Cosmos-style destination chain.
//!
//! Module map mirrors the component breakdown: `secret` (C1), `timelock`
//! (C2), `quote`/`oracle` (C3), `chain` (C4), `monitor` (C5), `store` (C6),
//! `state_machine` (C7), `coordinator` (C8), `notifier` (C9), `api` (C10).

pub mod api;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod metrics;
pub mod monitor;
pub mod notifier;
pub mod oracle;
pub mod quote;
pub mod retry;
pub mod secret;
pub mod state_machine;
pub mod store;
pub mod timelock;
pub mod types;
