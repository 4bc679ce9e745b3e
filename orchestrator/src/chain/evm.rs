//! Adapts `multichain_rs::evm::EvmAdapter` to the coordinator's
//! chain-agnostic `ChainAdapter` trait.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use multichain_rs::evm::EvmAdapter;
use multichain_rs::types::{ActionKey, ChainEvent};
use multichain_rs::{TxRef, TxStatus};
use std::str::FromStr;

use super::{ChainAdapter, LockParams};

pub struct EvmChainAdapter {
    inner: EvmAdapter,
}

impl EvmChainAdapter {
    pub fn new(inner: EvmAdapter) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChainAdapter for EvmChainAdapter {
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
        let token = Address::from_str(&params.token).wrap_err("invalid token address")?;
        let taker = Address::from_str(&params.counterparty).wrap_err("invalid counterparty address")?;
        let amount = U256::from_str(&params.amount).wrap_err("invalid amount")?;

        self.inner
            .lock(
                action_key,
                hashlock,
                token,
                amount,
                taker,
                U256::from(params.withdrawal_time),
                U256::from(params.public_withdrawal_time),
                U256::from(params.cancellation_time),
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
