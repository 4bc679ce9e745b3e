//! Destination-chain adapter (Cosmos-style, Terra Classic-compatible LCD).

pub mod client;
pub mod contracts;
pub mod events;

pub use client::DestinationClient;

use eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::hash::bytes32_to_hex;
use crate::types::{ActionKey, ChainEvent, TxRef, TxStatus};
use contracts::{EscrowResponse, ExecuteMsg, QueryMsg};
use events::WasmEventAttrs;

pub struct TerraAdapterConfig {
    pub lcd_url: String,
    pub fallback_lcd_urls: Vec<String>,
    pub chain_id: String,
    pub mnemonic: String,
    pub bech32_prefix: String,
    pub escrow_address: String,
    pub gas_denom: String,
    pub gas_price: f64,
    pub required_confirmations: u64,
}

/// Adapter over the destination chain's CosmWasm HTLC escrow contract.
pub struct TerraAdapter {
    client: DestinationClient,
    escrow_address: String,
    gas_denom: String,
    gas_price: f64,
    required_confirmations: u64,
    submitted: Mutex<HashMap<ActionKey, TxRef>>,
}

impl TerraAdapter {
    pub fn connect(config: TerraAdapterConfig) -> Result<Self> {
        let client = DestinationClient::new(
            &config.lcd_url,
            &config.chain_id,
            &config.mnemonic,
            config.fallback_lcd_urls,
            &config.bech32_prefix,
        )?;

        info!(chain_id = %config.chain_id, escrow = %config.escrow_address, "destination adapter connected");

        Ok(Self {
            client,
            escrow_address: config.escrow_address,
            gas_denom: config.gas_denom,
            gas_price: config.gas_price,
            required_confirmations: config.required_confirmations,
            submitted: Mutex::new(HashMap::new()),
        })
    }

    pub async fn current_height(&self) -> Result<u64> {
        self.client
            .get_latest_height()
            .await
            .map_err(|e| eyre!("CHAIN_CONNECTION_FAILED: {}", e))
    }

    /// CometBFT blocks finalize on commit, so a confirmation depth of 0 is a
    /// reasonable default; `required_confirmations` stays configurable per
    /// deployment for operators who want the same safety margin on both legs.
    pub async fn finalized_height(&self) -> Result<u64> {
        let height = self.current_height().await?;
        Ok(height.saturating_sub(self.required_confirmations))
    }

    /// Fetch and decode escrow events in `(from, to]` by searching committed
    /// transactions against the escrow contract over the LCD's tx search API.
    pub async fn get_logs(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        if to <= from {
            return Ok(Vec::new());
        }

        let tx_logs = self
            .client
            .search_contract_txs(&self.escrow_address, from + 1, to)
            .await
            .map_err(|e| eyre!("CHAIN_CONNECTION_FAILED: {}", e))?;

        let mut events = Vec::new();
        for (height, wasm_logs) in tx_logs {
            events.extend(self.decode_wasm_events(height, &wasm_logs)?);
        }

        events.sort_by_key(|e| (e.height, e.log_index));
        Ok(events)
    }

    pub fn decode_wasm_events(
        &self,
        height: u64,
        events: &[(u64, Vec<(String, String)>)],
    ) -> Result<Vec<ChainEvent>> {
        let mut out = Vec::new();
        for (log_index, attrs) in events {
            let parsed = WasmEventAttrs { attrs };
            if let Some(event) = parsed.decode(height, *log_index)? {
                out.push(event);
            }
        }
        Ok(out)
    }

    pub async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        // A committed txhash from `execute_contract` is already finalized
        // by the time it is returned (the client waits for block inclusion).
        if tx_ref.0.is_empty() {
            return Ok(TxStatus::Pending);
        }
        Ok(TxStatus::Finalized {
            height: self.current_height().await.unwrap_or(0),
        })
    }

    fn already_submitted(&self, key: &ActionKey) -> Option<TxRef> {
        self.submitted.lock().expect("poisoned lock").get(key).cloned()
    }

    fn record_submission(&self, key: ActionKey, tx_ref: TxRef) {
        self.submitted.lock().expect("poisoned lock").insert(key, tx_ref);
    }

    pub async fn lock(
        &self,
        action_key: ActionKey,
        hashlock: [u8; 32],
        token: &str,
        amount: &str,
        maker: &str,
        withdrawal_time: u64,
        cancellation_time: u64,
    ) -> Result<TxRef> {
        if let Some(existing) = self.already_submitted(&action_key) {
            return Ok(existing);
        }

        let msg = ExecuteMsg::Lock {
            hashlock: bytes32_to_hex(&hashlock),
            token: token.to_string(),
            amount: amount.to_string(),
            maker: maker.to_string(),
            withdrawal_time,
            cancellation_time,
        };

        let txhash = self
            .client
            .execute_contract(&self.escrow_address, &msg, vec![], &self.gas_denom, self.gas_price)
            .await
            .map_err(|e| eyre!("TRANSACTION_FAILED: {}", e))?;

        let tx_ref = TxRef(txhash);
        self.record_submission(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub async fn reveal(
        &self,
        action_key: ActionKey,
        hashlock: [u8; 32],
        preimage: [u8; 32],
    ) -> Result<TxRef> {
        if let Some(existing) = self.already_submitted(&action_key) {
            return Ok(existing);
        }

        let msg = ExecuteMsg::Reveal {
            hashlock: bytes32_to_hex(&hashlock),
            preimage: bytes32_to_hex(&preimage),
        };

        let txhash = self
            .client
            .execute_contract(&self.escrow_address, &msg, vec![], &self.gas_denom, self.gas_price)
            .await
            .map_err(|e| eyre!("TRANSACTION_FAILED: {}", e))?;

        let tx_ref = TxRef(txhash);
        self.record_submission(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub async fn refund(&self, action_key: ActionKey, hashlock: [u8; 32]) -> Result<TxRef> {
        if let Some(existing) = self.already_submitted(&action_key) {
            return Ok(existing);
        }

        let msg = ExecuteMsg::Refund {
            hashlock: bytes32_to_hex(&hashlock),
        };

        let txhash = self
            .client
            .execute_contract(&self.escrow_address, &msg, vec![], &self.gas_denom, self.gas_price)
            .await
            .map_err(|e| eyre!("TRANSACTION_FAILED: {}", e))?;

        let tx_ref = TxRef(txhash);
        self.record_submission(action_key, tx_ref.clone());
        Ok(tx_ref)
    }

    pub async fn query_escrow(&self, hashlock: [u8; 32]) -> Result<EscrowResponse> {
        let query = QueryMsg::Escrow {
            hashlock: bytes32_to_hex(&hashlock),
        };
        self.client
            .query_contract(&self.escrow_address, &query)
            .await
            .map_err(|e| {
                warn!(error = %e, "escrow query failed");
                eyre!("CHAIN_CONNECTION_FAILED: {}", e)
            })
    }
}
