//! In-process `ChainAdapter` backed by `multichain_rs::testing::MockChain`,
//! used by the coordinator's own tests and the seed-scenario integration
//! suite so neither needs a live RPC endpoint.

use async_trait::async_trait;
use eyre::Result;
use multichain_rs::testing::MockChain;
use multichain_rs::types::{ActionKey, ChainEvent};
use multichain_rs::{TxRef, TxStatus};

use super::{ChainAdapter, LockParams};

pub struct MockChainAdapter {
    inner: MockChain,
}

impl MockChainAdapter {
    pub fn new(inner: MockChain) -> Self {
        Self { inner }
    }

    pub fn chain(&self) -> &MockChain {
        &self.inner
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    async fn current_height(&self) -> Result<u64> {
        Ok(self.inner.current_height())
    }

    async fn finalized_height(&self) -> Result<u64> {
        Ok(self.inner.finalized_height())
    }

    async fn get_logs(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        Ok(self.inner.get_logs(from, to))
    }

    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        self.inner.tx_status(tx_ref)
    }

    async fn lock(
        &self,
        action_key: ActionKey,
        hashlock: [u8; 32],
        _params: LockParams,
    ) -> Result<TxRef> {
        self.inner.lock(action_key, hashlock)
    }

    async fn reveal(&self, action_key: ActionKey, hashlock: [u8; 32], preimage: [u8; 32]) -> Result<TxRef> {
        self.inner.reveal(action_key, hashlock, preimage)
    }

    async fn refund(&self, action_key: ActionKey, hashlock: [u8; 32]) -> Result<TxRef> {
        self.inner.refund(action_key, hashlock)
    }
}
