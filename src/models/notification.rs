use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeliveryError;
use crate::models::Tier;

/// A chat plus an optional forum topic, parsed from a configured channel string
/// such as `-1002149791590_797`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelDestination {
    pub chat_id: String,
    pub thread_id: Option<i64>,
    raw: String,
}

impl ChannelDestination {
    /// Split `raw` on the first `separator`; the part after it must be numeric.
    pub fn parse(raw: &str, separator: &str) -> Result<Self, DeliveryError> {
        let raw = raw.trim();
        let (chat, thread) = match raw.split_once(separator) {
            Some((chat, thread)) if !separator.is_empty() => (chat, Some(thread)),
            _ => (raw, None),
        };

        if chat.is_empty() {
            return Err(DeliveryError::InvalidDestination(raw.to_string()));
        }

        let thread_id = match thread {
            Some(thread) => Some(
                thread
                    .parse::<i64>()
                    .map_err(|_| DeliveryError::InvalidDestination(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            chat_id: chat.to_string(),
            thread_id,
            raw: raw.to_string(),
        })
    }

    /// The channel string as configured
    pub fn label(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ChannelDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One message bound for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub destination: ChannelDestination,
    pub body: String,
}

/// Result of delivering to one channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            error: None,
        }
    }

    pub fn failed(channel: &str, error: &DeliveryError) -> Self {
        Self {
            channel: channel.to_string(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-dispatch summary across every routed channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchReport {
    pub tier: Tier,
    pub deliveries: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries.len() - self.delivered_count()
    }

    pub fn channels(&self) -> Vec<&str> {
        self.deliveries.iter().map(|d| d.channel.as_str()).collect()
    }
}
