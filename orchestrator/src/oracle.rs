//! Price oracle implementations consumed by the Dutch-auction quoter (C3).
//!
//! Production wires `HttpPriceOracle` against a configurable rate-feed URL;
//! the quoter itself never knows which concrete implementation backs it
//! (see `quote::Quoter`'s `Arc<dyn PriceOracle>` field).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::quote::PriceOracle;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct RateResponse {
    rate: f64,
}

/// Queries an external rate-feed service over HTTP. Treats any transport
/// or parse failure as "unavailable" rather than propagating an error —
/// the quoter maps a `None` reference price to `QUOTE_UNAVAILABLE` itself.
pub struct HttpPriceOracle {
    client: Client,
    base_url: String,
}

impl HttpPriceOracle {
    pub fn new(base_url: String) -> eyre::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn reference_price(&self, from_token: &str, to_token: &str) -> Option<f64> {
        let url = format!("{}/rate/{}/{}", self.base_url, from_token, to_token);
        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, from_token, to_token, "price oracle request failed");
                return None;
            }
        };

        match response.json::<RateResponse>().await {
            Ok(body) => Some(body.rate),
            Err(e) => {
                warn!(error = %e, from_token, to_token, "price oracle response malformed");
                None
            }
        }
    }
}

/// Fixed-rate oracle for local testing and the integration seed scenarios,
/// where a live rate feed would make the tests non-deterministic.
pub struct FixedRateOracle {
    rate: f64,
}

impl FixedRateOracle {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl PriceOracle for FixedRateOracle {
    async fn reference_price(&self, _from_token: &str, _to_token: &str) -> Option<f64> {
        Some(self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_rate_oracle_returns_configured_rate() {
        let oracle = FixedRateOracle::new(12.5);
        let price = oracle.reference_price("ETH", "LUNA").await;
        assert_eq!(price, Some(12.5));
    }
}
