//! Cosmos-style destination-chain LCD client for transaction signing and
//! broadcasting.
//!
//! Implements transaction signing using `cosmrs` and broadcasting via the
//! LCD REST API, with mnemonic-derived secp256k1 signing.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use bip39::Mnemonic;
use cosmrs::{
    bip32::DerivationPath,
    crypto::secp256k1::SigningKey,
    tx::{self, Fee, Msg, SignDoc, SignerInfo},
    AccountId, Coin,
};
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const DERIVATION_PATH: &str = "m/44'/330'/0'/0/0";

/// LCD client for the destination chain, signing and broadcasting HTLC
/// escrow contract calls.
pub struct DestinationClient {
    lcd_url: String,
    fallback_urls: Vec<String>,
    chain_id: String,
    signing_key: SigningKey,
    pub address: AccountId,
    client: Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub sequence: u64,
    pub account_number: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct TxSearchResponse {
    tx_responses: Vec<TxSearchEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TxSearchEntry {
    height: String,
    #[serde(default)]
    logs: Vec<TxSearchLog>,
}

#[derive(Debug, Clone, Deserialize)]
struct TxSearchLog {
    #[serde(default)]
    events: Vec<TxSearchEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct TxSearchEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    attributes: Vec<TxSearchAttr>,
}

#[derive(Debug, Clone, Deserialize)]
struct TxSearchAttr {
    key: String,
    value: String,
}

impl DestinationClient {
    /// Create a new destination-chain client from a mnemonic.
    pub fn new(
        lcd_url: &str,
        chain_id: &str,
        mnemonic: &str,
        fallback_urls: Vec<String>,
        bech32_prefix: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("failed to create HTTP client")?;

        let mnemonic = Mnemonic::parse(mnemonic).map_err(|e| eyre!("invalid mnemonic: {}", e))?;
        let seed = mnemonic.to_seed("");
        let path: DerivationPath = DERIVATION_PATH
            .parse()
            .map_err(|e| eyre!("invalid derivation path: {:?}", e))?;

        let signing_key = SigningKey::derive_from_path(seed, &path)
            .map_err(|e| eyre!("failed to derive signing key: {}", e))?;

        let public_key = signing_key.public_key();
        let address = public_key
            .account_id(bech32_prefix)
            .map_err(|e| eyre!("failed to derive account id: {}", e))?;

        info!(address = %address, chain_id = chain_id, "destination chain client initialized");

        Ok(Self {
            lcd_url: lcd_url.trim_end_matches('/').to_string(),
            fallback_urls,
            chain_id: chain_id.to_string(),
            signing_key,
            address,
            client,
        })
    }

    pub async fn get_account_info(&self) -> Result<AccountInfo> {
        let url = format!(
            "{}/cosmos/auth/v1beta1/accounts/{}",
            self.lcd_url, self.address
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err("failed to query account info")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "account query failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        let data: serde_json::Value = response.json().await?;
        let account = data
            .get("account")
            .ok_or_else(|| eyre!("missing 'account' field in response"))?;

        let sequence = account
            .get("sequence")
            .or_else(|| account.get("base_account").and_then(|b| b.get("sequence")))
            .and_then(|v| v.as_str())
            .unwrap_or("0")
            .parse()
            .unwrap_or(0);

        let account_number = account
            .get("account_number")
            .or_else(|| {
                account
                    .get("base_account")
                    .and_then(|b| b.get("account_number"))
            })
            .and_then(|v| v.as_str())
            .unwrap_or("0")
            .parse()
            .unwrap_or(0);

        Ok(AccountInfo {
            sequence,
            account_number,
        })
    }

    pub fn lcd_url(&self) -> &str {
        &self.lcd_url
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Sign and broadcast a CosmWasm execute message, retrying once on a
    /// sequence mismatch (another tx from this account landed first).
    pub async fn execute_contract(
        &self,
        contract_address: &str,
        msg: &impl Serialize,
        funds: Vec<(String, u128)>,
        gas_denom: &str,
        gas_price: f64,
    ) -> Result<String> {
        const MAX_RETRIES: u32 = 3;
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self
                .execute_contract_inner(contract_address, msg, &funds, gas_denom, gas_price)
                .await
            {
                Ok(txhash) => return Ok(txhash),
                Err(e) => {
                    let error_str = e.to_string();
                    if error_str.contains("account sequence mismatch")
                        || error_str.contains("code 32")
                        || error_str.contains("incorrect account sequence")
                    {
                        warn!(
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            error = %e,
                            "sequence mismatch, refreshing account info and retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(500 * (1 << attempt))).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| eyre!("execute_contract failed after {} retries", MAX_RETRIES)))
    }

    async fn execute_contract_inner(
        &self,
        contract_address: &str,
        msg: &impl Serialize,
        funds: &[(String, u128)],
        gas_denom: &str,
        gas_price: f64,
    ) -> Result<String> {
        let account_info = self.get_account_info().await?;
        debug!(
            sequence = account_info.sequence,
            account_number = account_info.account_number,
            "fetched account info for signing"
        );

        let gas_limit: u64 = 500_000;
        let fee_amount = ((gas_limit as f64) * gas_price).ceil() as u128;

        let msg_json = serde_json::to_vec(msg)?;

        let coins: Vec<Coin> = funds
            .iter()
            .map(|(denom, amount)| {
                let denom_parsed = denom
                    .parse()
                    .map_err(|e| eyre!("invalid coin denom '{}': {}", denom, e))?;
                Ok::<_, eyre::Report>(Coin {
                    denom: denom_parsed,
                    amount: *amount,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let execute_msg = cosmrs::cosmwasm::MsgExecuteContract {
            sender: self.address.clone(),
            contract: contract_address
                .parse()
                .map_err(|e| eyre!("invalid contract address: {:?}", e))?,
            msg: msg_json,
            funds: coins,
        };

        let body = tx::Body::new(
            vec![execute_msg
                .to_any()
                .map_err(|e| eyre!("failed to convert message: {}", e))?],
            "",
            0u32,
        );

        let public_key = self.signing_key.public_key();
        let signer_info = SignerInfo::single_direct(Some(public_key), account_info.sequence);

        let fee = Fee::from_amount_and_gas(
            Coin {
                denom: gas_denom
                    .parse()
                    .map_err(|e| eyre!("invalid gas denom '{}': {}", gas_denom, e))?,
                amount: fee_amount,
            },
            gas_limit,
        );

        let auth_info = signer_info.auth_info(fee);
        let chain_id = self.chain_id.parse().map_err(|_| eyre!("invalid chain id"))?;

        let sign_doc = SignDoc::new(&body, &auth_info, &chain_id, account_info.account_number)
            .map_err(|e| eyre!("failed to create sign doc: {}", e))?;

        let tx_raw = sign_doc
            .sign(&self.signing_key)
            .map_err(|e| eyre!("failed to sign transaction: {}", e))?;

        let tx_bytes = tx_raw
            .to_bytes()
            .map_err(|e| eyre!("failed to serialize transaction: {}", e))?;

        self.broadcast_tx(&tx_bytes).await
    }

    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> Result<String> {
        let urls: Vec<&str> = std::iter::once(self.lcd_url.as_str())
            .chain(self.fallback_urls.iter().map(|s| s.as_str()))
            .collect();

        let tx_b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, tx_bytes);
        let broadcast_request = serde_json::json!({
            "tx_bytes": tx_b64,
            "mode": "BROADCAST_MODE_SYNC"
        });

        let mut last_error = None;

        for url in urls {
            let base_url = url.trim_end_matches('/');
            let broadcast_url = format!("{}/cosmos/tx/v1beta1/txs", base_url);

            info!(url = %broadcast_url, "broadcasting transaction");

            match self
                .client
                .post(&broadcast_url)
                .json(&broadcast_request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    let body: serde_json::Value = response
                        .json()
                        .await
                        .unwrap_or_else(|_| serde_json::json!({"error": "failed to parse response"}));

                    if status.is_success() {
                        if let Some(tx_response) = body.get("tx_response") {
                            let code = tx_response
                                .get("code")
                                .and_then(|v| v.as_u64())
                                .unwrap_or(0);

                            if code == 0 {
                                let txhash = tx_response
                                    .get("txhash")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or("")
                                    .to_string();

                                info!(txhash = %txhash, "broadcast accepted, waiting for confirmation");

                                match self.wait_for_tx_confirmation(&txhash, base_url).await {
                                    Ok(()) => return Ok(txhash),
                                    Err(e) => {
                                        warn!(txhash = %txhash, error = %e, "confirmation wait failed, broadcast still accepted");
                                        return Ok(txhash);
                                    }
                                }
                            } else {
                                let raw_log = tx_response
                                    .get("raw_log")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or("unknown error");
                                last_error =
                                    Some(eyre!("transaction failed (code {}): {}", code, raw_log));
                                continue;
                            }
                        }
                    }

                    last_error = Some(eyre!("broadcast failed: {}", body));
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "failed to broadcast to endpoint");
                    last_error = Some(eyre!("network error: {}", e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| eyre!("all broadcast attempts failed")))
    }

    async fn wait_for_tx_confirmation(&self, txhash: &str, base_url: &str) -> Result<()> {
        let timeout = Duration::from_secs(30);
        let initial_delay = Duration::from_millis(500);
        let max_delay = Duration::from_secs(3);

        let start = Instant::now();
        let mut delay = initial_delay;
        let tx_url = format!("{}/cosmos/tx/v1beta1/txs/{}", base_url, txhash);

        while start.elapsed() < timeout {
            tokio::time::sleep(delay).await;

            match self.client.get(&tx_url).send().await {
                Ok(response) if response.status().is_success() => {
                    let body: serde_json::Value = response.json().await.unwrap_or_default();
                    if let Some(tx_response) = body.get("tx_response") {
                        let code = tx_response
                            .get("code")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0);
                        if code == 0 {
                            return Ok(());
                        }
                        let raw_log = tx_response
                            .get("raw_log")
                            .and_then(|v| v.as_str())
                            .unwrap_or("unknown error");
                        return Err(eyre!("transaction failed in block (code {}): {}", code, raw_log));
                    }
                }
                Ok(response) if response.status().as_u16() == 404 => {
                    debug!(txhash = %txhash, "not yet indexed, waiting");
                }
                Ok(_) => {}
                Err(e) => warn!(txhash = %txhash, error = %e, "error querying transaction status"),
            }

            delay = std::cmp::min(delay * 2, max_delay);
        }

        Err(eyre!("timeout waiting for transaction {} to be confirmed", txhash))
    }

    pub async fn query_contract<T: for<'de> Deserialize<'de>>(
        &self,
        contract_address: &str,
        query_msg: &impl Serialize,
    ) -> Result<T> {
        let query_json = serde_json::to_string(query_msg)?;
        let query_b64 =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, query_json);

        let url = format!(
            "{}/cosmwasm/wasm/v1/contract/{}/smart/{}",
            self.lcd_url, contract_address, query_b64
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err("failed to query contract")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "query failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        let data: serde_json::Value = response.json().await?;
        let query_data = data
            .get("data")
            .ok_or_else(|| eyre!("missing 'data' field in response"))?;

        serde_json::from_value(query_data.clone()).map_err(|e| eyre!("failed to parse response: {}", e))
    }

    /// Search committed transactions touching `contract_address` in the
    /// height range `[from_height, to_height]`, grouped by height with each
    /// tx's `wasm` event attribute lists in message order. Mirrors the EVM
    /// adapter's `get_logs` in spirit — the destination chain has no topic
    /// filter, so the filtering happens server-side via the tx search query.
    pub async fn search_contract_txs(
        &self,
        contract_address: &str,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<(u64, Vec<(u64, Vec<(String, String)>)>)>> {
        let query = format!(
            "wasm._contract_address='{}' AND tx.height>={} AND tx.height<={}",
            contract_address, from_height, to_height
        );
        let url = format!("{}/cosmos/tx/v1beta1/txs", self.lcd_url);

        let response = self
            .client
            .get(&url)
            .query(&[("query", query.as_str()), ("order_by", "ORDER_BY_ASC")])
            .send()
            .await
            .wrap_err("failed to search contract transactions")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "tx search failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        let parsed: TxSearchResponse = response
            .json()
            .await
            .wrap_err("failed to parse tx search response")?;

        let mut out = Vec::new();
        for tx in parsed.tx_responses {
            let height: u64 = tx.height.parse().unwrap_or(0);
            let mut wasm_logs = Vec::new();
            for (log_index, log) in tx.logs.iter().enumerate() {
                for event in &log.events {
                    if event.event_type != "wasm" {
                        continue;
                    }
                    let attrs: Vec<(String, String)> = event
                        .attributes
                        .iter()
                        .filter(|a| a.key != "_contract_address" || a.value == contract_address)
                        .map(|a| (a.key.clone(), a.value.clone()))
                        .collect();
                    wasm_logs.push((log_index as u64, attrs));
                }
            }
            if !wasm_logs.is_empty() {
                out.push((height, wasm_logs));
            }
        }
        Ok(out)
    }

    /// Get the current height via the LCD's latest block endpoint.
    pub async fn get_latest_height(&self) -> Result<u64> {
        let url = format!("{}/cosmos/base/tendermint/v1beta1/blocks/latest", self.lcd_url);
        let response = self.client.get(&url).send().await.wrap_err("failed to query latest block")?;
        let data: serde_json::Value = response.json().await?;
        let height = data
            .get("block")
            .and_then(|b| b.get("header"))
            .and_then(|h| h.get("height"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| eyre!("missing block height in response"))?
            .parse()?;
        Ok(height)
    }
}
