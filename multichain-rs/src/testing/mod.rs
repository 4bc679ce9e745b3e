//! Testing utilities: synthetic chains for the seed-test scenarios.
//!
//! Mirrors the production chain adapter contract (`current_height`,
//! `finalized_height`, `get_logs`, idempotent writes) without any network
//! I/O, so the coordinator and event monitor can be driven deterministically
//! in-process.

pub mod assertions;
pub mod mock_chain;

pub use mock_chain::{MockChain, MockChainBuilder};
