use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::TransactionDetail;

/// Upstream source of parsed transactions
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// `Ok(None)` when the node has no record of `signature`
    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>, RpcError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Map a JSON-RPC error object onto the crate error, detecting rate limits
/// that some providers report inside a 200 response.
fn classify_rpc_error(code: i64, message: String) -> RpcError {
    if code == 429 || code == -32429 || message.contains("Too Many Requests") {
        return RpcError::RateLimit;
    }
    match code {
        -32700 => RpcError::InvalidResponse("Parse error".to_string()),
        -32600 => RpcError::InvalidResponse("Invalid request".to_string()),
        _ => RpcError::Method { code, message },
    }
}

/// Solana JSON-RPC client over HTTP
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    commitment: String,
}

impl RpcClient {
    pub fn new(endpoint: &str) -> Result<Self, RpcError> {
        Self::new_with_config(endpoint, 30, "confirmed")
    }

    pub fn new_with_config(endpoint: &str, timeout_seconds: u64, commitment: &str) -> Result<Self, RpcError> {
        let context = LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(endpoint))
            .with_metadata("timeout_seconds", json!(timeout_seconds))
            .with_metadata("commitment", json!(commitment));
        context.info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            timeout_seconds,
            commitment: commitment.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Option<Value>, RpcError> {
        let context = LogContext::new("rpc_client", "make_request")
            .with_metadata("method", json!(method))
            .with_metadata("endpoint", json!(self.endpoint));

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        context.trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout { seconds: self.timeout_seconds }
                } else if e.is_connect() {
                    RpcError::Connection(e.to_string())
                } else {
                    RpcError::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimit);
        }
        if !status.is_success() {
            return Err(RpcError::Connection(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RpcError::Timeout { seconds: self.timeout_seconds }
            } else {
                RpcError::Http(e)
            }
        })?;
        let rpc_response: JsonRpcResponse = serde_json::from_str(&body)?;

        if let Some(error) = rpc_response.error {
            return Err(classify_rpc_error(error.code, error.message));
        }

        Ok(rpc_response.result.filter(|v| !v.is_null()))
    }
}

#[async_trait]
impl TransactionSource for RpcClient {
    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>, RpcError> {
        let monitor = PerformanceMonitor::new("rpc_get_transaction")
            .with_metadata("signature", json!(signature));

        let params = vec![
            json!(signature),
            json!({
                "encoding": "jsonParsed",
                "maxSupportedTransactionVersion": 0,
                "commitment": self.commitment,
            }),
        ];

        let result = self.make_request("getTransaction", params).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call("getTransaction", duration, result.is_ok());

        match result? {
            Some(value) => Ok(Some(TransactionDetail::from_rpc_result(value)?)),
            None => Ok(None),
        }
    }
}
