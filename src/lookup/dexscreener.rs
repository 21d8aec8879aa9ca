use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::LookupError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::lookup::{MetadataLookup, ProfileLookup};
use crate::models::{TokenMetadata, TokenProfile};

#[derive(Debug, Deserialize)]
pub struct Order {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

/// The orders endpoint has returned both shapes over time
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrdersResponse {
    Bare(Vec<Order>),
    Envelope { orders: Vec<Order> },
}

impl OrdersResponse {
    fn into_orders(self) -> Vec<Order> {
        match self {
            OrdersResponse::Bare(orders) => orders,
            OrdersResponse::Envelope { orders } => orders,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub pair_address: Option<String>,
    pub base_token: Token,
    pub quote_token: Token,
}

#[derive(Debug, Deserialize)]
pub struct Token {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// True when any order is an approved token profile
pub fn has_approved_profile(orders: &[Order]) -> bool {
    orders
        .iter()
        .any(|order| order.kind == "tokenProfile" && order.status == "approved")
}

/// Name and symbol of `address` from the first pair that lists it
pub fn metadata_from_pairs(pairs: Vec<Pair>, address: &str) -> Option<TokenMetadata> {
    pairs.into_iter().find_map(|pair| {
        let token = if pair.base_token.address == address {
            pair.base_token
        } else if pair.quote_token.address == address {
            pair.quote_token
        } else {
            return None;
        };
        Some(TokenMetadata {
            name: token.name.filter(|n| !n.is_empty()),
            symbol: token.symbol.filter(|s| !s.is_empty()),
        })
    })
}

/// DexScreener client for paid-profile and token metadata lookups
#[derive(Clone)]
pub struct DexScreenerClient {
    client: Client,
    profile_base_url: String,
    metadata_base_url: String,
}

impl DexScreenerClient {
    pub fn new(profile_base_url: &str, metadata_base_url: &str, timeout_seconds: u64) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            profile_base_url: profile_base_url.trim_end_matches('/').to_string(),
            metadata_base_url: metadata_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, LookupError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl ProfileLookup for DexScreenerClient {
    async fn get_token_profile(&self, address: &str) -> Result<TokenProfile, LookupError> {
        let url = format!("{}/orders/v1/solana/{}", self.profile_base_url, address);
        let monitor = PerformanceMonitor::new("dexscreener_orders");

        let result = async {
            let body = self.get_text(&url).await?;
            let response: OrdersResponse = serde_json::from_str(&body)?;
            Ok::<_, LookupError>(TokenProfile {
                approved: has_approved_profile(&response.into_orders()),
            })
        }
        .await;

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_lookup("profile", address, duration, result.is_ok());
        result
    }
}

#[async_trait]
impl MetadataLookup for DexScreenerClient {
    async fn get_token_metadata(&self, address: &str) -> Result<Option<TokenMetadata>, LookupError> {
        let url = format!("{}/tokens/v1/solana/{}", self.metadata_base_url, address);
        let monitor = PerformanceMonitor::new("dexscreener_tokens");

        let result = async {
            let body = self.get_text(&url).await?;
            let pairs: Vec<Pair> = serde_json::from_str(&body)?;
            Ok::<_, LookupError>(metadata_from_pairs(pairs, address))
        }
        .await;

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_lookup("metadata", address, duration, result.is_ok());

        if let Ok(None) = result {
            LogContext::new("dexscreener", "get_token_metadata")
                .with_token_address(address)
                .with_metadata("url", json!(url))
                .debug("No pairs indexed for token yet");
        }
        result
    }
}
