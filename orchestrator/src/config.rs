//! Configuration (ambient stack, §4.3): `dotenvy` + `env::var` loader
//! mirroring `operator::config::Config::load`/`load_from_env`/`validate`,
//! with the same redacted-`Debug` pattern for secrets.

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::quote::QuoterConfig;
use crate::retry::RetryConfig;
use crate::secret::DEFAULT_LIFETIME_HOURS;
use crate::store::SessionStoreConfig;
use crate::timelock::TimelockConfig;

/// Comma-separated RPC URL list, trimmed and emptied of blanks — same
/// contract as the teacher's `rpc_fallback::parse_rpc_urls`.
pub fn parse_rpc_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone)]
pub struct EvmChainConfig {
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub escrow_address: String,
    pub private_key: Option<String>,
    pub required_confirmations: u64,
}

impl fmt::Debug for EvmChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmChainConfig")
            .field("rpc_urls", &self.rpc_urls)
            .field("chain_id", &self.chain_id)
            .field("escrow_address", &self.escrow_address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("required_confirmations", &self.required_confirmations)
            .finish()
    }
}

#[derive(Clone)]
pub struct DestinationChainConfig {
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

impl fmt::Debug for DestinationChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationChainConfig")
            .field("lcd_url", &self.lcd_url)
            .field("fallback_lcd_urls", &self.fallback_lcd_urls)
            .field("chain_id", &self.chain_id)
            .field("mnemonic", &"<redacted>")
            .field("bech32_prefix", &self.bech32_prefix)
            .field("escrow_address", &self.escrow_address)
            .field("gas_denom", &self.gas_denom)
            .field("gas_price", &self.gas_price)
            .field("required_confirmations", &self.required_confirmations)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub source_interval: Duration,
    pub destination_interval: Duration,
    pub max_reorg_depth: u64,
}

#[derive(Debug, Clone)]
pub struct QuoteOracleConfig {
    pub base_url: String,
}

/// Top-level process configuration. Loaded once in `main` and shared
/// read-only (via `Arc`) by every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_port: u16,
    pub push_channel_port: u16,
    pub evm: EvmChainConfig,
    pub destination: DestinationChainConfig,
    pub polling: PollingConfig,
    pub store: SessionStoreConfig,
    pub quoter: QuoterConfig,
    pub oracle: QuoteOracleConfig,
    pub timelock: TimelockConfig,
    pub retry: RetryConfig,
    pub secret_lifetime_hours: i64,
    pub notifier_backlog: usize,
}

fn default_listen_port() -> u16 {
    8080
}

fn default_push_channel_port() -> u16 {
    8081
}

fn default_confirmations() -> u64 {
    12
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_reorg_depth() -> u64 {
    10
}

fn env_var_required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| eyre!("{key} environment variable is required"))
}

fn env_var_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load from `.env` if present, falling back to the plain environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("failed to load .env file from {path}"))?;
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let evm_rpc_raw = env_var_required("EVM_RPC_URL")?;
        let evm_rpc_urls = parse_rpc_urls(&evm_rpc_raw);
        if evm_rpc_urls.is_empty() {
            return Err(eyre!("EVM_RPC_URL cannot be empty"));
        }

        let evm = EvmChainConfig {
            rpc_urls: evm_rpc_urls,
            chain_id: env_var_required("EVM_CHAIN_ID")?
                .parse()
                .wrap_err("EVM_CHAIN_ID must be a valid u64")?,
            escrow_address: env_var_required("EVM_ESCROW_ADDRESS")?,
            private_key: env::var("EVM_PRIVATE_KEY").ok(),
            required_confirmations: env_var_parsed("EVM_REQUIRED_CONFIRMATIONS", default_confirmations()),
        };

        let destination_lcd_raw = env_var_required("DESTINATION_LCD_URL")?;
        let destination_lcd_urls = parse_rpc_urls(&destination_lcd_raw);
        if destination_lcd_urls.is_empty() {
            return Err(eyre!("DESTINATION_LCD_URL cannot be empty"));
        }

        let destination = DestinationChainConfig {
            lcd_url: destination_lcd_urls[0].clone(),
            fallback_lcd_urls: destination_lcd_urls[1..].to_vec(),
            chain_id: env_var_required("DESTINATION_CHAIN_ID")?,
            mnemonic: env_var_required("DESTINATION_MNEMONIC")?,
            bech32_prefix: env::var("DESTINATION_BECH32_PREFIX").unwrap_or_else(|_| "terra".to_string()),
            escrow_address: env_var_required("DESTINATION_ESCROW_ADDRESS")?,
            gas_denom: env::var("DESTINATION_GAS_DENOM").unwrap_or_else(|_| "uluna".to_string()),
            gas_price: env_var_parsed("DESTINATION_GAS_PRICE", 0.015),
            required_confirmations: env_var_parsed("DESTINATION_REQUIRED_CONFIRMATIONS", default_confirmations()),
        };

        let polling = PollingConfig {
            source_interval: Duration::from_secs(env_var_parsed(
                "SOURCE_POLL_INTERVAL_SECS",
                default_poll_interval_secs(),
            )),
            destination_interval: Duration::from_secs(env_var_parsed(
                "DESTINATION_POLL_INTERVAL_SECS",
                default_poll_interval_secs(),
            )),
            max_reorg_depth: env_var_parsed("MAX_REORG_DEPTH", default_max_reorg_depth()),
        };

        let store = SessionStoreConfig {
            max_active_sessions: env_var_parsed("MAX_ACTIVE_SESSIONS", 1000),
            terminal_grace_period_secs: env_var_parsed("SESSION_TTL_SECS", 7200),
        };

        let quoter = QuoterConfig {
            premium: env_var_parsed("AUCTION_PREMIUM", 0.005),
            discount: env_var_parsed("AUCTION_DISCOUNT", 0.005),
            base_duration_secs: env_var_parsed("AUCTION_BASE_DURATION_SECS", 300),
        };

        let oracle = QuoteOracleConfig {
            base_url: env_var_required("PRICE_ORACLE_URL")?,
        };

        let timelock = TimelockConfig {
            public_window_secs: env_var_parsed("TIMELOCK_PUBLIC_WINDOW_SECS", 10 * 60),
            cancel_window_secs: env_var_parsed("TIMELOCK_CANCEL_WINDOW_SECS", 30 * 60),
            safety_buffer_secs: env_var_parsed("TIMELOCK_SAFETY_BUFFER_SECS", 2 * 60 * 60),
        };

        let retry = RetryConfig {
            max_retries: env_var_parsed("RETRY_MAX_ATTEMPTS", 3),
            initial_backoff: Duration::from_millis(env_var_parsed("RETRY_INITIAL_BACKOFF_MS", 1000)),
            max_backoff: Duration::from_millis(env_var_parsed("RETRY_MAX_BACKOFF_MS", 5000)),
            backoff_multiplier: env_var_parsed("RETRY_BACKOFF_MULTIPLIER", 2.0),
        };

        let config = Config {
            listen_port: env_var_parsed("LISTEN_PORT", default_listen_port()),
            push_channel_port: env_var_parsed("PUSH_CHANNEL_PORT", default_push_channel_port()),
            evm,
            destination,
            polling,
            store,
            quoter,
            oracle,
            timelock,
            retry,
            secret_lifetime_hours: env_var_parsed("SECRET_LIFETIME_HOURS", DEFAULT_LIFETIME_HOURS),
            notifier_backlog: env_var_parsed("NOTIFIER_BACKLOG", 64),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.evm.escrow_address.is_empty() {
            return Err(eyre!("evm.escrow_address cannot be empty"));
        }
        if self.destination.escrow_address.is_empty() {
            return Err(eyre!("destination.escrow_address cannot be empty"));
        }
        let mnemonic_words: Vec<&str> = self.destination.mnemonic.split_whitespace().collect();
        if mnemonic_words.len() < 12 {
            return Err(eyre!("destination.mnemonic must have at least 12 words"));
        }
        if self.listen_port == self.push_channel_port {
            return Err(eyre!("listen_port and push_channel_port must differ"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rpc_urls_trims_and_drops_empty() {
        let urls = parse_rpc_urls(" https://a.com , https://b.com ,,");
        assert_eq!(urls, vec!["https://a.com", "https://b.com"]);
    }
}
