//! Retry with exponential backoff and jitter for transient Firestore failures.

use std::future::Future;
use std::time::{Duration, SystemTime};

use tracing::{info_span, warn, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff (ms).
    pub base_delay_ms: u64,
    /// Maximum delay cap (ms).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Read `FIRESTORE_RETRY_*` overrides from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_parse("FIRESTORE_RETRY_MAX_ATTEMPTS").unwrap_or(defaults.max_retries),
            base_delay_ms: env_parse("FIRESTORE_RETRY_BASE_MS").unwrap_or(defaults.base_delay_ms),
            max_delay_ms: env_parse("FIRESTORE_RETRY_MAX_MS").unwrap_or(defaults.max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// Reject a base delay larger than the cap.
    pub fn validate(&self) -> FirestoreResult<()> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(FirestoreError::config(format!(
                "retry base delay {}ms exceeds max delay {}ms",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Execute an async operation, retrying transient failures.
///
/// Network errors, 429 and 5xx responses are retried; everything else is
/// returned immediately.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = FirestoreResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        let span = info_span!("firestore_retry", operation = %operation, attempt = attempt + 1);
        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());
                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Firestore operation failed, retrying: {}",
                    e
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff with full jitter, floored at the base delay.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after);
    }

    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp_delay.min(config.max_delay_ms);

    // Sub-second clock noise is enough jitter here
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let jittered = ((capped as f64) * ((nanos % 1000) as f64 / 1000.0)) as u64;

    Duration::from_millis(jittered.max(config.base_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn test_calculate_delay_with_retry_after() {
        let delay = calculate_delay(&RetryConfig::default(), 0, Some(2000));
        assert_eq!(delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_calculate_delay_bounds() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 2000,
        };
        let delay = calculate_delay(&config, 10, None);
        assert!(delay.as_millis() >= 1000);
        assert!(delay.as_millis() <= 2000);
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let config = RetryConfig {
            max_retries: 1,
            base_delay_ms: 500,
            max_delay_ms: 100,
        };
        assert!(config.validate().is_err());
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_config(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FirestoreError::ServerError(503, "unavailable".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: FirestoreResult<()> = with_retry(&fast_config(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FirestoreError::PermissionDenied("nope".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: FirestoreResult<()> = with_retry(&fast_config(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FirestoreError::ServerError(500, "boom".into()))
        })
        .await;
        assert!(matches!(result, Err(FirestoreError::ServerError(500, _))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
