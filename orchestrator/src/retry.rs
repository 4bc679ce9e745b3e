//! Centralized retry utility shared by the event monitor's polling loop and
//! the coordinator's chain writes.
//!
//! Generalizes the teacher's transaction-writer retry helper: no gas
//! bumping (a swap write either lands or the coordinator moves to a refund
//! path; there is no mempool replacement concept shared across both chain
//! families), just classify-then-backoff-or-give-up.

use eyre::{eyre, Result};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
    Unknown,
}

/// Classify a chain-adapter error string for retry decisions. Shared
/// vocabulary across EVM and Cosmos-style failures since both surface
/// transport errors as plain strings by the time they reach this layer.
pub fn classify_error(error: &str) -> ErrorClass {
    let lower = error.to_lowercase();

    if lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("network")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("503")
        || lower.contains("502")
        || lower.contains("temporarily unavailable")
    {
        return ErrorClass::Transient;
    }

    if lower.contains("reverted")
        || lower.contains("execution reverted")
        || lower.contains("invalid signature")
        || lower.contains("insufficient funds")
        || lower.contains("out of gas")
        || lower.contains("already revealed")
        || lower.contains("already refunded")
    {
        return ErrorClass::Permanent;
    }

    ErrorClass::Unknown
}

/// Run `operation` until it succeeds, a permanent error is classified, or
/// the retry budget is exhausted.
pub async fn with_retry<F, T, Fut>(config: &RetryConfig, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let error_str = e.to_string();
                match classify_error(&error_str) {
                    ErrorClass::Permanent => {
                        warn!(label, error = %error_str, "permanent error, giving up");
                        return Err(eyre!("{}: permanent failure: {}", label, error_str));
                    }
                    ErrorClass::Transient | ErrorClass::Unknown => {
                        if !config.should_retry(attempt) {
                            warn!(label, attempt, error = %error_str, "retry budget exhausted");
                            return Err(eyre!(
                                "{}: retry budget exhausted after {} attempts: {}",
                                label,
                                attempt + 1,
                                error_str
                            ));
                        }
                        let backoff = config.backoff_for_attempt(attempt);
                        debug!(label, attempt, ?backoff, error = %error_str, "retrying after backoff");
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}

/// Tracks consecutive write failures against one chain and opens a cooldown
/// window after too many in a row, so the coordinator stops hot-looping a
/// chain that has gone unhealthy.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    consecutive_failures: u32,
    opened_at: Option<std::time::Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// True if writes should be refused right now.
    pub fn is_open(&self) -> bool {
        match self.opened_at {
            Some(at) => at.elapsed() < self.config.cooldown,
            None => false,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.failure_threshold {
            self.opened_at = Some(std::time::Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(5)); // capped
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(classify_error("connection timeout"), ErrorClass::Transient);
        assert_eq!(classify_error("execution reverted"), ErrorClass::Permanent);
        assert_eq!(classify_error("some unknown error"), ErrorClass::Unknown);
    }

    #[test]
    fn test_circuit_breaker_opens_after_threshold() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        });
        assert!(!breaker.is_open());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
        breaker.record_success();
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_after_transient_failures() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        };
        let mut attempts = 0;
        let result: Result<u32> = with_retry(&config, "test", || {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt < 3 {
                    Err(eyre!("connection timeout"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
