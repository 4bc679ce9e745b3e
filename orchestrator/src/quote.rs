//! Dutch-Auction Quoter (C3): a stateless price-path simulator. Quotes do
//! not reserve liquidity and are safe to recompute on every call.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use multichain_rs::ChainTag;
use serde::Serialize;
use std::sync::Arc;

use crate::errors::CoordinatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Fast,
    Normal,
    Slow,
}

impl Urgency {
    fn multiplier(self) -> f64 {
        match self {
            Urgency::Fast => 0.5,
            Urgency::Normal => 1.0,
            Urgency::Slow => 2.0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fast" => Some(Urgency::Fast),
            "normal" => Some(Urgency::Normal),
            "slow" => Some(Urgency::Slow),
            _ => None,
        }
    }
}

/// External price reference the quoter consumes. Production wires this to
/// a real price feed; tests supply a fixed or scripted implementation.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn reference_price(&self, from_token: &str, to_token: &str) -> Option<f64>;
}

#[derive(Debug, Clone)]
pub struct QuoterConfig {
    pub premium: f64,
    pub discount: f64,
    pub base_duration_secs: i64,
}

impl Default for QuoterConfig {
    fn default() -> Self {
        Self {
            premium: 0.005,
            discount: 0.005,
            base_duration_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub rate: f64,
    pub start_price: f64,
    pub end_price: f64,
    pub duration_secs: i64,
    pub current_price: f64,
    pub price_impact_bps: u32,
    pub fees_bps: u32,
    pub valid_until: DateTime<Utc>,
}

/// Holds the oracle behind a trait object so the API surface can build one
/// `Quoter` at startup regardless of which concrete oracle backs it (a live
/// HTTP feed in production, a fixed-rate stub in tests).
pub struct Quoter {
    config: QuoterConfig,
    oracle: Arc<dyn PriceOracle>,
}

impl Quoter {
    pub fn new(config: QuoterConfig, oracle: Arc<dyn PriceOracle>) -> Self {
        Self { config, oracle }
    }

    /// Compute a quote as of `now`, with the auction clock starting at
    /// `issued_at` (normally equal to `now`; tests pass a past timestamp to
    /// simulate elapsed auction time). Validates the chain tags per §6.1's
    /// `quote` input list before touching the oracle, so an unrecognized
    /// chain tag (e.g. `"mars"`) is rejected as `VALIDATION_ERROR` with no
    /// side effect, matching `create_session`'s validation order.
    pub async fn quote(
        &self,
        source_chain: &str,
        destination_chain: &str,
        from_token: &str,
        to_token: &str,
        amount: u128,
        urgency: Urgency,
        issued_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Quote, CoordinatorError> {
        ChainTag::parse(source_chain)
            .ok_or_else(|| CoordinatorError::Validation("source_chain must be 'source' or 'destination'".to_string()))?;
        ChainTag::parse(destination_chain).ok_or_else(|| {
            CoordinatorError::Validation("destination_chain must be 'source' or 'destination'".to_string())
        })?;

        let reference_price = self
            .oracle
            .reference_price(from_token, to_token)
            .await
            .ok_or_else(|| CoordinatorError::QuoteUnavailable("price oracle unavailable".to_string()))?;

        let start_price = reference_price * (1.0 + self.config.premium);
        let end_price = reference_price * (1.0 - self.config.discount);
        let duration_secs =
            (self.config.base_duration_secs as f64 * urgency.multiplier()).round() as i64;

        let elapsed_secs = (now - issued_at).num_milliseconds().max(0) as f64 / 1000.0;
        let progress = (elapsed_secs / duration_secs as f64).min(1.0);
        let current_price = start_price - (start_price - end_price) * progress;

        let price_impact_bps = price_impact_bps_for_notional(amount);

        Ok(Quote {
            rate: current_price,
            start_price,
            end_price,
            duration_secs,
            current_price,
            price_impact_bps,
            fees_bps: 0,
            valid_until: now + ChronoDuration::seconds(60),
        })
    }
}

fn price_impact_bps_for_notional(amount: u128) -> u32 {
    match amount {
        a if a < 10_000 => 10,
        a if a < 100_000 => 30,
        a if a < 1_000_000 => 50,
        _ => 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOracle(Option<f64>);

    #[async_trait]
    impl PriceOracle for FixedOracle {
        async fn reference_price(&self, _from_token: &str, _to_token: &str) -> Option<f64> {
            self.0
        }
    }

    #[tokio::test]
    async fn test_quote_at_issuance_is_start_price() {
        let quoter = Quoter::new(QuoterConfig::default(), Arc::new(FixedOracle(Some(100.0))));
        let now = Utc::now();
        let quote = quoter
            .quote("source", "destination", "ETH", "USDC", 1_000, Urgency::Normal, now, now)
            .await
            .unwrap();
        assert!((quote.current_price - 100.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_quote_at_full_duration_is_end_price() {
        let quoter = Quoter::new(QuoterConfig::default(), Arc::new(FixedOracle(Some(100.0))));
        let issued_at = Utc::now() - ChronoDuration::seconds(301);
        let now = Utc::now();
        let quote = quoter
            .quote("source", "destination", "ETH", "USDC", 1_000, Urgency::Normal, issued_at, now)
            .await
            .unwrap();
        assert!((quote.current_price - 99.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_oracle_unavailable_returns_quote_unavailable() {
        let quoter = Quoter::new(QuoterConfig::default(), Arc::new(FixedOracle(None)));
        let now = Utc::now();
        let err = quoter
            .quote("source", "destination", "ETH", "USDC", 1_000, Urgency::Normal, now, now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "QUOTE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_unknown_chain_tag_rejected_before_oracle_call() {
        let quoter = Quoter::new(QuoterConfig::default(), Arc::new(FixedOracle(None)));
        let now = Utc::now();
        let err = quoter
            .quote("mars", "destination", "ETH", "USDC", 1_000, Urgency::Normal, now, now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_price_impact_tiers() {
        assert_eq!(price_impact_bps_for_notional(9_999), 10);
        assert_eq!(price_impact_bps_for_notional(99_999), 30);
        assert_eq!(price_impact_bps_for_notional(999_999), 50);
        assert_eq!(price_impact_bps_for_notional(10_000_000), 100);
    }
}
