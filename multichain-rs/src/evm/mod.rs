//! EVM source-chain adapter: the concrete read/write surface the
//! orchestrator's `ChainAdapter` trait delegates to for the source leg of a
//! swap.

pub mod client;
pub mod contracts;

use alloy::primitives::{Address, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use eyre::{eyre, Result, WrapErr};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::types::{ActionKey, ChainEvent, ChainEventKind, ChainTag, TxRef, TxStatus};
use client::EvmClient;
use contracts::{EscrowLocked, HtlcEscrow, Refunded, SecretRevealed};

/// Maximum block span per `get_logs` call; providers commonly cap batch
/// responses, so the adapter chunks wider ranges internally.
const MAX_BLOCKS_PER_CALL: u64 = 100;

pub struct EvmAdapterConfig {
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub escrow_address: String,
    pub private_key: Option<String>,
    pub required_confirmations: u64,
}

/// Adapter over the EVM source chain's HTLC escrow contract.
///
/// Holds one client per configured RPC endpoint; writes and reads fail over
/// to the next endpoint on transport error. `submitted` makes writes
/// idempotent by `ActionKey`, matching the at-most-once submission contract
/// every chain adapter must uphold.
pub struct EvmAdapter {
    clients: Vec<EvmClient>,
    escrow_address: Address,
    chain_id: u64,
    required_confirmations: u64,
    submitted: Mutex<HashMap<ActionKey, TxRef>>,
}

impl EvmAdapter {
    pub async fn connect(config: EvmAdapterConfig) -> Result<Self> {
        if config.rpc_urls.is_empty() {
            return Err(eyre!("at least one EVM RPC URL is required"));
        }

        let escrow_address = Address::from_str(&config.escrow_address)
            .wrap_err("invalid escrow contract address")?;

        let mut clients = Vec::with_capacity(config.rpc_urls.len());
        for url in &config.rpc_urls {
            let client = match &config.private_key {
                Some(pk) => EvmClient::new_with_signer(url, config.chain_id, pk).await?,
                None => EvmClient::new_readonly(url, config.chain_id).await?,
            };
            // Sentinel connection test: a cheap read confirms the endpoint
            // is live and pinned to the expected chain id before it is
            // trusted for writes.
            let remote_chain_id = client.get_chain_id().await?;
            if remote_chain_id != config.chain_id {
                return Err(eyre!(
                    "EVM endpoint {} reports chain id {} but {} was expected",
                    url,
                    remote_chain_id,
                    config.chain_id
                ));
            }
            clients.push(client);
        }

        info!(
            endpoints = clients.len(),
            chain_id = config.chain_id,
            "EVM adapter connected"
        );

        Ok(Self {
            clients,
            escrow_address,
            chain_id: config.chain_id,
            required_confirmations: config.required_confirmations,
            submitted: Mutex::new(HashMap::new()),
        })
    }

    fn provider_chain<'a>(
        &'a self,
    ) -> impl Iterator<Item = &'a alloy::providers::RootProvider<alloy::transports::http::Http<alloy::transports::http::Client>>>
    {
        self.clients.iter().map(|c| match c {
            EvmClient::ReadOnly(r) => &r.provider,
            EvmClient::WithSigner(_) => unreachable!("signer provider accessed via direct call"),
        })
    }

    pub async fn current_height(&self) -> Result<u64> {
        for client in &self.clients {
            match client.get_block_number().await {
                Ok(h) => return Ok(h),
                Err(e) => warn!(error = %e, "EVM endpoint failed, trying next"),
            }
        }
        Err(eyre!("CHAIN_CONNECTION_FAILED: all EVM endpoints failed"))
    }

    pub async fn finalized_height(&self) -> Result<u64> {
        let height = self.current_height().await?;
        Ok(height.saturating_sub(self.required_confirmations))
    }

    /// Fetch and decode escrow events in `(from, to]`, chunking internally
    /// so no single provider call spans more than `MAX_BLOCKS_PER_CALL`.
    pub async fn get_logs(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        if to <= from {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let mut chunk_start = from + 1;

        while chunk_start <= to {
            let chunk_end = (chunk_start + MAX_BLOCKS_PER_CALL - 1).min(to);
            let filter = Filter::new()
                .address(self.escrow_address)
                .from_block(chunk_start)
                .to_block(chunk_end);

            let logs = self.fetch_logs_with_failover(&filter).await?;
            for log in logs {
                if let Some(event) = decode_log(&log)? {
                    events.push(event);
                }
            }

            chunk_start = chunk_end + 1;
        }

        events.sort_by_key(|e| (e.height, e.log_index));
        Ok(events)
    }

    async fn fetch_logs_with_failover(
        &self,
        filter: &Filter,
    ) -> Result<Vec<alloy::rpc::types::Log>> {
        let mut last_err = None;
        for provider in self.provider_chain() {
            match provider.get_logs(filter).await {
                Ok(logs) => return Ok(logs),
                Err(e) => {
                    warn!(error = %e, "get_logs failed on endpoint, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(eyre!(
            "CHAIN_CONNECTION_FAILED: get_logs exhausted all endpoints: {:?}",
            last_err
        ))
    }

    pub async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        let hash: B256 = tx_ref
            .0
            .parse()
            .map_err(|_| eyre!("BLOCK_NOT_FOUND: malformed tx ref {}", tx_ref.0))?;

        for provider in self.provider_chain() {
            match provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    let height = receipt.block_number.unwrap_or_default();
                    if !receipt.status() {
                        return Ok(TxStatus::Failed {
                            reason: "execution reverted".to_string(),
                        });
                    }
                    let current = self.current_height().await?;
                    let confirmations = current.saturating_sub(height);
                    return Ok(if confirmations >= self.required_confirmations {
                        TxStatus::Finalized { height }
                    } else {
                        TxStatus::Included { height }
                    });
                }
                Ok(None) => return Ok(TxStatus::Pending),
                Err(e) => warn!(error = %e, "tx_status lookup failed on endpoint, trying next"),
            }
        }
        Err(eyre!("CHAIN_CONNECTION_FAILED: tx_status exhausted all endpoints"))
    }

    fn signer(&self) -> Result<&client::EvmClientWithSigner> {
        self.clients
            .iter()
            .find_map(|c| match c {
                EvmClient::WithSigner(s) => Some(s),
                EvmClient::ReadOnly(_) => None,
            })
            .ok_or_else(|| eyre!("EVM adapter has no signer configured for writes"))
    }

    fn already_submitted(&self, key: &ActionKey) -> Option<TxRef> {
        self.submitted.lock().expect("poisoned lock").get(key).cloned()
    }

    fn record_submission(&self, key: ActionKey, tx_ref: TxRef) {
        self.submitted
            .lock()
            .expect("poisoned lock")
            .insert(key, tx_ref);
    }

    /// Lock an escrow on the source chain. Idempotent on `action_key`.
    pub async fn lock(
        &self,
        action_key: ActionKey,
        hashlock: [u8; 32],
        token: Address,
        amount: U256,
        taker: Address,
        withdrawal_time: U256,
        public_withdrawal_time: U256,
        cancellation_time: U256,
    ) -> Result<TxRef> {
        if let Some(existing) = self.already_submitted(&action_key) {
            return Ok(existing);
        }

        let signer = self.signer()?;
        let contract = HtlcEscrow::new(self.escrow_address, &signer.provider);
        let pending = contract
            .lock(
                hashlock.into(),
                token,
                amount,
                taker,
                withdrawal_time,
                public_withdrawal_time,
                cancellation_time,
            )
            .send()
            .await
            .wrap_err("TRANSACTION_FAILED: lock submission rejected")?;

        let tx_ref = TxRef(format!("{:?}", pending.tx_hash()));
        self.record_submission(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    /// Reveal a preimage against an escrow's hashlock. Works identically for
    /// the destination-first and source-second reveals in the coordinator's
    /// sequence; only the configured escrow address differs.
    pub async fn reveal(
        &self,
        action_key: ActionKey,
        hashlock: [u8; 32],
        preimage: [u8; 32],
    ) -> Result<TxRef> {
        if let Some(existing) = self.already_submitted(&action_key) {
            return Ok(existing);
        }

        let signer = self.signer()?;
        let contract = HtlcEscrow::new(self.escrow_address, &signer.provider);
        let pending = contract
            .reveal(hashlock.into(), preimage.into())
            .send()
            .await
            .wrap_err("TRANSACTION_FAILED: reveal submission rejected")?;

        let tx_ref = TxRef(format!("{:?}", pending.tx_hash()));
        self.record_submission(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub async fn refund(&self, action_key: ActionKey, hashlock: [u8; 32]) -> Result<TxRef> {
        if let Some(existing) = self.already_submitted(&action_key) {
            return Ok(existing);
        }

        let signer = self.signer()?;
        let contract = HtlcEscrow::new(self.escrow_address, &signer.provider);
        let pending = contract
            .refund(hashlock.into())
            .send()
            .await
            .wrap_err("TRANSACTION_FAILED: refund submission rejected")?;

        let tx_ref = TxRef(format!("{:?}", pending.tx_hash()));
        self.record_submission(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Decode a raw log into a chain-agnostic `ChainEvent`, or `None` if it is
/// not one of the three escrow event signatures the coordinator cares about.
fn decode_log(log: &alloy::rpc::types::Log) -> Result<Option<ChainEvent>> {
    let topics = log.topics();
    if topics.is_empty() {
        return Ok(None);
    }

    let height = log.block_number.unwrap_or_default();
    let log_index = log.log_index.unwrap_or_default();

    if topics[0] == EscrowLocked::SIGNATURE_HASH {
        let decoded = log
            .log_decode::<EscrowLocked>()
            .wrap_err("failed to decode EscrowLocked log")?;
        let hashlock = decoded.inner.hashlock.0;
        return Ok(Some(ChainEvent {
            chain: ChainTag::Source,
            height,
            log_index,
            hashlock,
            kind: ChainEventKind::EscrowLocked {
                escrow_ref: format!("{:?}", log.transaction_hash.unwrap_or_default()),
            },
        }));
    }

    if topics[0] == SecretRevealed::SIGNATURE_HASH {
        let decoded = log
            .log_decode::<SecretRevealed>()
            .wrap_err("failed to decode SecretRevealed log")?;
        let hashlock = decoded.inner.hashlock.0;
        let preimage = decoded.inner.preimage.0;
        return Ok(Some(ChainEvent {
            chain: ChainTag::Source,
            height,
            log_index,
            hashlock,
            kind: ChainEventKind::SecretRevealed { preimage },
        }));
    }

    if topics[0] == Refunded::SIGNATURE_HASH {
        let decoded = log
            .log_decode::<Refunded>()
            .wrap_err("failed to decode Refunded log")?;
        let hashlock = decoded.inner.hashlock.0;
        return Ok(Some(ChainEvent {
            chain: ChainTag::Source,
            height,
            log_index,
            hashlock,
            kind: ChainEventKind::Refunded,
        }));
    }

    Ok(None)
}
