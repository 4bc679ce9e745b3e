//! Chain Adapter (C4): the uniform capability set the coordinator drives,
//! resolved statically over one implementation per chain family rather
//! than a dynamic-dispatch registry (per the design note on per-chain
//! behavior).

pub mod evm;
pub mod mock;
pub mod terra;

use async_trait::async_trait;
use eyre::Result;
use multichain_rs::types::{ActionKey, ChainEvent};
use multichain_rs::{TxRef, TxStatus};

/// Chain-agnostic parameters for locking an escrow. Smallest-unit amounts
/// and addresses travel as decimal/hex strings so this shape fits both the
/// EVM and Cosmos-style adapters without leaking either's native types.
#[derive(Debug, Clone)]
pub struct LockParams {
    pub token: String,
    pub amount: String,
    pub counterparty: String,
    pub withdrawal_time: u64,
    pub public_withdrawal_time: u64,
    pub cancellation_time: u64,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    async fn current_height(&self) -> Result<u64>;
    async fn finalized_height(&self) -> Result<u64>;
    async fn get_logs(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>>;
    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus>;
    async fn lock(&self, action_key: ActionKey, hashlock: [u8; 32], params: LockParams) -> Result<TxRef>;
    async fn reveal(&self, action_key: ActionKey, hashlock: [u8; 32], preimage: [u8; 32]) -> Result<TxRef>;
    async fn refund(&self, action_key: ActionKey, hashlock: [u8; 32]) -> Result<TxRef>;
}
