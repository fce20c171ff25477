//! Retry Mechanism for Remote Calls
//!
//! Exponential backoff with a delay cap. The caller decides which failures are
//! worth another attempt; everything else is returned immediately.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

//-----------------------------------------------------------------------------
// Retry Configuration
//-----------------------------------------------------------------------------

/// Configuration for retrying operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Delay after the first failed attempt in milliseconds
    pub initial_delay_ms: u64,

    /// Factor by which to increase delay on each retry
    pub backoff_factor: f64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Policy for the chain JSON-RPC endpoint: 5 attempts, 5 s minimum, x1.5
    pub fn chain_rpc() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 5_000,
            backoff_factor: 1.5,
            max_delay_ms: 60_000,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent))
            .min(self.max_delay_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }
}

//-----------------------------------------------------------------------------
// Retry Loop
//-----------------------------------------------------------------------------

/// Run `f` until it succeeds, the error is not retryable or attempts run out.
///
/// The last error is returned unchanged.
pub async fn retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation: &str,
    should_retry: P,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    return Err(err);
                }

                let delay = config.calculate_delay(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_calculate_delay() {
        let config = RetryConfig::chain_rpc();
        assert_eq!(config.calculate_delay(1), Duration::from_millis(5_000));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(7_500));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(11_250));

        let config = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 1_000,
            backoff_factor: 2.0,
            max_delay_ms: 5_000,
        };
        assert_eq!(config.calculate_delay(3), Duration::from_millis(4_000));
        assert_eq!(config.calculate_delay(4), Duration::from_millis(5_000));
        assert_eq!(config.calculate_delay(40), Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry(
            &RetryConfig::chain_rpc(),
            "test",
            |_| true,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unavailable".to_string())
            },
        )
        .await;

        assert_eq!(result, Err("unavailable".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_permanent_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry(
            &RetryConfig::default(),
            "test",
            |err: &String| err != "permanent",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("permanent".to_string())
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_first_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = retry(&RetryConfig::default(), "test", |_| true, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {}", n))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
    }
}
