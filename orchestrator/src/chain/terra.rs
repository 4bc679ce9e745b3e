//! Adapts `multichain_rs::terra::TerraAdapter` to the coordinator's
//! chain-agnostic `ChainAdapter` trait.

use async_trait::async_trait;
use eyre::Result;
use multichain_rs::terra::TerraAdapter;
use multichain_rs::types::{ActionKey, ChainEvent};
use multichain_rs::{TxRef, TxStatus};

use super::{ChainAdapter, LockParams};

pub struct TerraChainAdapter {
    inner: TerraAdapter,
}

impl TerraChainAdapter {
    pub fn new(inner: TerraAdapter) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChainAdapter for TerraChainAdapter {
    async fn current_height(&self) -> Result<u64> {
        self.inner.current_height().await
    }

    async fn finalized_height(&self) -> Result<u64> {
        self.inner.finalized_height().await
    }

    async fn get_logs(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        self.inner.get_logs(from, to).await
    }

    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        self.inner.tx_status(tx_ref).await
    }

    async fn lock(&self, action_key: ActionKey, hashlock: [u8; 32], params: LockParams) -> Result<TxRef> {
        self.inner
            .lock(
                action_key,
                hashlock,
                &params.token,
                &params.amount,
                &params.counterparty,
                params.withdrawal_time,
                params.cancellation_time,
            )
            .await
    }

    async fn reveal(&self, action_key: ActionKey, hashlock: [u8; 32], preimage: [u8; 32]) -> Result<TxRef> {
        self.inner.reveal(action_key, hashlock, preimage).await
    }

    async fn refund(&self, action_key: ActionKey, hashlock: [u8; 32]) -> Result<TxRef> {
        self.inner.refund(action_key, hashlock).await
    }
}
