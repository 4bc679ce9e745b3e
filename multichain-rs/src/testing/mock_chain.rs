//! In-process synthetic chain used by the seed-test scenarios.
//!
//! A `MockChain` behaves like a minimal EVM/Cosmos adapter: it has a height
//! that advances on demand, a log of injected events, and idempotent
//! writes keyed by `ActionKey`. Tests inject events at chosen heights to
//! exercise the event monitor's reorg handling and the coordinator's
//! matching logic without a live RPC endpoint.

use eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{ActionKey, ChainEvent, ChainEventKind, ChainTag, TxRef, TxStatus};

struct MockChainState {
    height: u64,
    finalized_height: u64,
    events: Vec<ChainEvent>,
    submitted: HashMap<ActionKey, TxRef>,
    tx_counter: u64,
}

/// A synthetic chain for deterministic coordinator/event-monitor tests.
pub struct MockChain {
    tag: ChainTag,
    state: Mutex<MockChainState>,
}

impl MockChain {
    pub fn new(tag: ChainTag) -> Self {
        Self {
            tag,
            state: Mutex::new(MockChainState {
                height: 0,
                finalized_height: 0,
                events: Vec::new(),
                submitted: HashMap::new(),
                tx_counter: 0,
            }),
        }
    }

    /// Advance both height and finalized height by `blocks`.
    pub fn advance(&self, blocks: u64) {
        let mut state = self.state.lock().expect("poisoned lock");
        state.height += blocks;
        state.finalized_height += blocks;
    }

    /// Inject an escrow-locked event at the given height.
    pub fn inject_escrow_locked(&self, height: u64, hashlock: [u8; 32], escrow_ref: &str) {
        let mut state = self.state.lock().expect("poisoned lock");
        let log_index = state.events.iter().filter(|e| e.height == height).count() as u64;
        state.events.push(ChainEvent {
            chain: self.tag,
            height,
            log_index,
            hashlock,
            kind: ChainEventKind::EscrowLocked {
                escrow_ref: escrow_ref.to_string(),
            },
        });
        if height > state.height {
            state.height = height;
            state.finalized_height = height;
        }
    }

    /// Simulate a reorg: drop every injected event at or above `from_height`.
    pub fn inject_reorg(&self, from_height: u64) {
        let mut state = self.state.lock().expect("poisoned lock");
        state.events.retain(|e| e.height < from_height);
    }

    pub fn current_height(&self) -> u64 {
        self.state.lock().expect("poisoned lock").height
    }

    pub fn finalized_height(&self) -> u64 {
        self.state.lock().expect("poisoned lock").finalized_height
    }

    pub fn get_logs(&self, from: u64, to: u64) -> Vec<ChainEvent> {
        let state = self.state.lock().expect("poisoned lock");
        state
            .events
            .iter()
            .filter(|e| e.height > from && e.height <= to)
            .cloned()
            .collect()
    }

    fn next_tx_ref(&self, state: &mut MockChainState) -> TxRef {
        state.tx_counter += 1;
        TxRef(format!("mock-tx-{}-{}", self.tag, state.tx_counter))
    }

    pub fn lock(&self, action_key: ActionKey, hashlock: [u8; 32]) -> Result<TxRef> {
        let mut state = self.state.lock().expect("poisoned lock");
        if let Some(existing) = state.submitted.get(&action_key) {
            return Ok(existing.clone());
        }
        let tx_ref = self.next_tx_ref(&mut state);
        let height = state.height + 1;
        state.height = height;
        state.finalized_height = height;
        let log_index = state.events.iter().filter(|e| e.height == height).count() as u64;
        state.events.push(ChainEvent {
            chain: self.tag,
            height,
            log_index,
            hashlock,
            kind: ChainEventKind::EscrowLocked {
                escrow_ref: tx_ref.0.clone(),
            },
        });
        state.submitted.insert(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub fn reveal(&self, action_key: ActionKey, hashlock: [u8; 32], preimage: [u8; 32]) -> Result<TxRef> {
        let mut state = self.state.lock().expect("poisoned lock");
        if let Some(existing) = state.submitted.get(&action_key) {
            return Ok(existing.clone());
        }
        let tx_ref = self.next_tx_ref(&mut state);
        let height = state.height + 1;
        state.height = height;
        state.finalized_height = height;
        let log_index = state.events.iter().filter(|e| e.height == height).count() as u64;
        state.events.push(ChainEvent {
            chain: self.tag,
            height,
            log_index,
            hashlock,
            kind: ChainEventKind::SecretRevealed { preimage },
        });
        state.submitted.insert(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub fn refund(&self, action_key: ActionKey, hashlock: [u8; 32]) -> Result<TxRef> {
        let mut state = self.state.lock().expect("poisoned lock");
        if let Some(existing) = state.submitted.get(&action_key) {
            return Ok(existing.clone());
        }
        let tx_ref = self.next_tx_ref(&mut state);
        let height = state.height + 1;
        state.height = height;
        state.finalized_height = height;
        let log_index = state.events.iter().filter(|e| e.height == height).count() as u64;
        state.events.push(ChainEvent {
            chain: self.tag,
            height,
            log_index,
            hashlock,
            kind: ChainEventKind::Refunded,
        });
        state.submitted.insert(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        let state = self.state.lock().expect("poisoned lock");
        if state.submitted.values().any(|v| v == tx_ref) {
            Ok(TxStatus::Finalized {
                height: state.height,
            })
        } else {
            Err(eyre!("BLOCK_NOT_FOUND: unknown tx_ref {}", tx_ref.0))
        }
    }
}

/// Builder for pre-seeded mock chains, mirroring the fluent construction
/// style used by the production deposit fixtures elsewhere in this crate.
pub struct MockChainBuilder {
    tag: ChainTag,
    initial_height: u64,
}

impl MockChainBuilder {
    pub fn new(tag: ChainTag) -> Self {
        Self {
            tag,
            initial_height: 0,
        }
    }

    pub fn initial_height(mut self, height: u64) -> Self {
        self.initial_height = height;
        self
    }

    pub fn build(self) -> MockChain {
        let chain = MockChain::new(self.tag);
        chain.advance(self.initial_height);
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_idempotent_on_action_key() {
        let chain = MockChain::new(ChainTag::Source);
        let key = ActionKey::new("session-1", "lock");
        let hashlock = [1u8; 32];
        let first = chain.lock(key.clone(), hashlock).unwrap();
        let second = chain.lock(key, hashlock).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reorg_drops_events_at_or_above_height() {
        let chain = MockChain::new(ChainTag::Source);
        chain.inject_escrow_locked(10, [2u8; 32], "ref-a");
        chain.inject_reorg(10);
        assert!(chain.get_logs(0, 100).is_empty());
    }
}
