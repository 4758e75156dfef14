//! Resilience utilities for connectors
//!
//! Request timeout and retry with exponential backoff for transient
//! failures (timeouts, connection errors, 5xx).

use std::time::Duration;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{ConnectorError, Result};

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default max retries for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay when a 429 carries no `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Default cap on a single rate-limit pause
pub const DEFAULT_MAX_RATE_LIMIT_WAIT_SECS: u64 = 900; // 15 minutes

/// Resilience configuration for a connector
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each retry)
    pub retry_base_delay_ms: u64,
    /// Upper bound for one rate-limit pause
    pub max_rate_limit_wait_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: 1000,
            max_rate_limit_wait_secs: DEFAULT_MAX_RATE_LIMIT_WAIT_SECS,
        }
    }
}

impl ResilienceConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get retry delay for attempt N (exponential backoff)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.retry_base_delay_ms * (1 << attempt.min(6)); // cap at 64x
        Duration::from_millis(delay_ms)
    }

    /// Pause to apply for a server-provided `Retry-After`
    pub fn rate_limit_wait(&self, retry_after_secs: u64) -> Duration {
        Duration::from_secs(retry_after_secs.min(self.max_rate_limit_wait_secs))
    }
}

/// Execute a request with timeout and retry logic
///
/// Errors for which `ConnectorError::is_retryable` is false are returned
/// immediately.
pub async fn execute_with_retry<F, Fut, T>(
    config: &ResilienceConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = config.retry_delay(attempt - 1);
            debug!(
                operation = operation_name,
                attempt,
                delay_ms = delay.as_millis(),
                "retrying after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match timeout(config.timeout(), operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_retryable() => return Err(e),
            Ok(Err(e)) => {
                if attempt < config.max_retries {
                    debug!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "request failed, will retry"
                    );
                }
                last_error = Some(e.to_string());
            }
            Err(_) => {
                if attempt < config.max_retries {
                    debug!(
                        operation = operation_name,
                        attempt,
                        timeout_secs = config.timeout_secs,
                        "request timed out, will retry"
                    );
                }
                last_error = Some("request timed out".to_string());
            }
        }
    }

    Err(ConnectorError::RetriesExhausted {
        attempts: config.max_retries + 1,
        last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
    })
}
