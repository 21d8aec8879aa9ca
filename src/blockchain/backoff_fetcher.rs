use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::TransactionSource;
use crate::error::{FailureCategory, RpcError};
use crate::logging::LogContext;
use crate::models::TransactionDetail;
use crate::retry::{RetryConfig, RetryError, RetryManager};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Transaction {signature} not found")]
    NotFound { signature: String },
    #[error("Rate limited on every one of {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("Upstream error: {0}")]
    Upstream(RpcError),
}

impl FetchError {
    pub fn category(&self) -> FailureCategory {
        match self {
            FetchError::NotFound { .. } => FailureCategory::NotFound,
            FetchError::RetriesExhausted { .. } | FetchError::Upstream(_) => {
                FailureCategory::UpstreamUnavailable
            }
        }
    }
}

/// Fetches transactions, retrying rate-limited lookups with exponential backoff.
///
/// Only [`RpcError::RateLimit`] is retried. Timeouts, HTTP failures and
/// JSON-RPC errors surface immediately as [`FetchError::Upstream`].
pub struct BackoffFetcher {
    source: Arc<dyn TransactionSource>,
    retry: RetryManager,
}

impl BackoffFetcher {
    pub fn new(source: Arc<dyn TransactionSource>, config: RetryConfig) -> Self {
        Self {
            source,
            retry: RetryManager::new("get_transaction", config),
        }
    }

    pub async fn fetch(&self, signature: &str) -> Result<TransactionDetail, FetchError> {
        let result = self
            .retry
            .execute(|| self.source.get_transaction(signature))
            .await;

        match result {
            Ok(Some(detail)) => Ok(detail),
            Ok(None) => {
                LogContext::new("backoff_fetcher", "fetch")
                    .with_signature(signature)
                    .debug("Transaction not found");
                Err(FetchError::NotFound {
                    signature: signature.to_string(),
                })
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                LogContext::new("backoff_fetcher", "fetch")
                    .with_signature(signature)
                    .with_retry_count(attempts)
                    .error("Max retries reached");
                Err(FetchError::RetriesExhausted { attempts })
            }
            Err(RetryError::Aborted(e)) => {
                LogContext::new("backoff_fetcher", "fetch")
                    .with_signature(signature)
                    .warn(&format!("Failed to fetch transaction: {}", e));
                Err(FetchError::Upstream(e))
            }
        }
    }
}
