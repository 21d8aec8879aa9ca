use std::time::Duration;
use tokio::time::sleep;

use crate::config::RpcConfig;
use crate::error::{NotifierError, RpcError};
use crate::logging::{ErrorLogger, LogContext, PerformanceMonitor};

/// Errors that can tell whether another attempt is worthwhile
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for RpcError {
    /// Only rate limiting is transient; everything else fails fast.
    fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }
}

impl Retryable for NotifierError {
    fn is_retryable(&self) -> bool {
        self.is_recoverable()
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first try; total tries is `max_retries + 1`
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Policy for transaction fetches: 500, 1000, 2000, 4000, 8000 ms
    pub fn for_rpc() -> Self {
        Self::default()
    }

    pub fn from_rpc_config(config: &RpcConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

/// Outcome of a retried operation that did not succeed
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error stopped the loop early
    Aborted(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted(e) => e,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            RetryError::Aborted(e) => write!(f, "aborted: {}", e),
        }
    }
}

/// Bounded retry loop with exponential backoff
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation, retrying while it fails with a retryable error.
    ///
    /// Attempts are numbered from 0. The delay before retry `n + 1` is
    /// `calculate_delay(n)`; there is no delay after the final attempt.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let monitor = PerformanceMonitor::new(&format!("retry_{}", self.operation_name));
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        ErrorLogger::log_recovery_success(
                            &self.operation_name,
                            attempt + 1,
                            monitor.start_time.elapsed().unwrap_or_default().as_millis() as u64,
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        let context = LogContext::new("retry", &self.operation_name)
                            .with_retry_count(attempt)
                            .with_metadata("reason", serde_json::json!("non_retryable"));
                        context.debug(&format!("Non-retryable error, aborting: {}", error));
                        return Err(RetryError::Aborted(error));
                    }

                    if attempt >= self.config.max_retries {
                        let context = LogContext::new("retry", &self.operation_name)
                            .with_metadata("attempts", serde_json::json!(attempt + 1));
                        context.error(&format!(
                            "All {} attempts failed: {}",
                            attempt + 1,
                            error
                        ));
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            last: error,
                        });
                    }

                    let delay = self.calculate_delay(attempt);
                    ErrorLogger::log_retry_attempt(
                        &self.operation_name,
                        &error,
                        attempt,
                        delay.as_millis() as u64,
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delay after failed attempt `attempt` (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.base_delay_ms as f64;
        let exponential_delay = base_delay * self.config.backoff_multiplier.powi(attempt as i32);

        let capped_delay = exponential_delay.min(self.config.max_delay_ms as f64);

        let final_delay = if self.config.jitter {
            let jitter_factor = 0.1;
            let jitter = capped_delay * jitter_factor * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 60_000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(!config.jitter);
    }

    #[test]
    fn test_delay_calculation() {
        let retry_manager = RetryManager::new("test", RetryConfig::for_rpc());

        let delays: Vec<u64> = (0..5)
            .map(|attempt| retry_manager.calculate_delay(attempt).as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000]);
    }

    #[test]
    fn test_delay_calculation_with_max_cap() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_ms: 5_000,
            max_delay_ms: 20_000,
            backoff_multiplier: 3.0,
            jitter: false,
        };

        let retry_manager = RetryManager::new("test", config);

        // 5000 * 3^4 = 405000, capped
        assert_eq!(retry_manager.calculate_delay(4).as_millis(), 20_000);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let config = RetryConfig {
            jitter: true,
            ..RetryConfig::default()
        };
        let retry_manager = RetryManager::new("test", config);

        for _ in 0..50 {
            let delay = retry_manager.calculate_delay(1).as_millis() as u64;
            assert!((950..=1050).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let retry_manager = RetryManager::new("test_operation", RetryConfig::for_rpc());

        let result = retry_manager
            .execute(|| async { Ok::<i32, RpcError>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_retryable_error_aborts_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry_manager = RetryManager::new("test_operation", RetryConfig::for_rpc());

        let counter = calls.clone();
        let result = retry_manager
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, RpcError>(RpcError::Connection("refused".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Aborted(RpcError::Connection(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_rate_limit_exhausts_after_six_tries() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry_manager = RetryManager::new("test_operation", RetryConfig::for_rpc());
        let start = tokio::time::Instant::now();

        let counter = calls.clone();
        let result = retry_manager
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, RpcError>(RpcError::RateLimit)
                }
            })
            .await;

        let elapsed = start.elapsed();
        assert!(matches!(
            result,
            Err(RetryError::Exhausted { attempts: 6, last: RpcError::RateLimit })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        // 500 + 1000 + 2000 + 4000 + 8000
        assert!(elapsed >= Duration::from_millis(15_500));
        assert!(elapsed < Duration::from_millis(15_600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry_manager = RetryManager::new("test_operation", RetryConfig::for_rpc());
        let start = tokio::time::Instant::now();

        let counter = calls.clone();
        let result = retry_manager
            .execute(|| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(RpcError::RateLimit)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(1_500));
        assert!(start.elapsed() < Duration::from_millis(1_600));
    }

    #[test]
    fn test_retry_error_into_inner() {
        let exhausted: RetryError<RpcError> = RetryError::Exhausted {
            attempts: 6,
            last: RpcError::RateLimit,
        };
        assert!(exhausted.to_string().contains("6 attempts"));
        assert!(matches!(exhausted.into_inner(), RpcError::RateLimit));
    }
}
