use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::AppConfig;
use crate::error::SubscriptionError;
use crate::logging::LogContext;
use crate::models::LogEvent;

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
    #[error("Monitor configuration error: {0}")]
    Config(String),
}

/// One decoded websocket frame
#[derive(Debug, PartialEq)]
pub enum Frame {
    Event(LogEvent),
    Subscribed(u64),
    Error(String),
    Ignored,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    result: NotificationResult,
}

#[derive(Debug, Deserialize)]
struct NotificationResult {
    context: NotificationContext,
    value: LogEvent,
}

#[derive(Debug, Deserialize)]
struct NotificationContext {
    slot: u64,
}

/// Decode a text frame from the `logsSubscribe` stream
pub fn parse_frame(text: &str) -> Result<Frame, serde_json::Error> {
    let message: Value = serde_json::from_str(text)?;

    if message.get("method").and_then(Value::as_str) == Some("logsNotification") {
        let params: NotificationParams = serde_json::from_value(message["params"].clone())?;
        let event = params.result.value.with_slot(params.result.context.slot);
        return Ok(Frame::Event(event));
    }

    if let Some(error) = message.get("error") {
        let description = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Ok(Frame::Error(description));
    }

    if message.get("id").is_some() {
        if let Some(id) = message.get("result").and_then(Value::as_u64) {
            return Ok(Frame::Subscribed(id));
        }
    }

    Ok(Frame::Ignored)
}

enum StreamEnd {
    Shutdown,
    ReceiverDropped,
}

/// Streams program logs over the JSON-RPC websocket, reconnecting on failure
pub struct LogSubscriber {
    ws_endpoint: String,
    program_address: String,
    commitment: String,
    reconnect_delay: Duration,
}

impl LogSubscriber {
    pub fn new(ws_endpoint: &str, program_address: &str, commitment: &str, reconnect_delay: Duration) -> Self {
        Self {
            ws_endpoint: ws_endpoint.to_string(),
            program_address: program_address.to_string(),
            commitment: commitment.to_string(),
            reconnect_delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.rpc.ws_endpoint,
            &config.watcher.program_address,
            &config.watcher.subscription_commitment,
            Duration::from_secs(config.watcher.reconnect_delay_seconds),
        )
    }

    pub fn subscribe_request(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [self.program_address] },
                { "commitment": self.commitment }
            ]
        })
    }

    /// Forward log events into `sender` until shutdown or the receiver is dropped
    pub async fn run(&self, sender: mpsc::Sender<LogEvent>, shutdown: Arc<AtomicBool>) -> Result<(), MonitorError> {
        if !self.ws_endpoint.starts_with("ws://") && !self.ws_endpoint.starts_with("wss://") {
            return Err(MonitorError::Config(format!(
                "websocket endpoint must use ws:// or wss://, got {}",
                self.ws_endpoint
            )));
        }

        let context = LogContext::new("log_subscriber", "run")
            .with_metadata("endpoint", json!(self.ws_endpoint))
            .with_metadata("program", json!(self.program_address));

        loop {
            if shutdown.load(Ordering::Relaxed) {
                context.info("Shutdown signal received, closing log subscription");
                return Ok(());
            }

            match self.stream_once(&sender, &shutdown).await {
                Ok(StreamEnd::Shutdown) => {
                    context.info("Shutdown signal received, closing log subscription");
                    return Ok(());
                }
                Ok(StreamEnd::ReceiverDropped) => {
                    context.info("Event receiver dropped, closing log subscription");
                    return Ok(());
                }
                Err(e) => {
                    context.warn(&format!(
                        "Log subscription interrupted: {}. Reconnecting in {}s",
                        e,
                        self.reconnect_delay.as_secs()
                    ));
                }
            }

            sleep(self.reconnect_delay).await;
        }
    }

    async fn stream_once(
        &self,
        sender: &mpsc::Sender<LogEvent>,
        shutdown: &AtomicBool,
    ) -> Result<StreamEnd, SubscriptionError> {
        let (ws, _) = connect_async(self.ws_endpoint.as_str()).await?;
        let (mut write, mut read) = ws.split();

        write
            .send(Message::Text(self.subscribe_request().to_string()))
            .await?;
        info!("Listening for {} logs on {}", self.program_address, self.ws_endpoint);

        let mut shutdown_poll = interval(SHUTDOWN_POLL_INTERVAL);

        loop {
            tokio::select! {
                message = read.next() => {
                    let text = match message {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Ping(payload))) => {
                            write.send(Message::Pong(payload)).await?;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => return Err(SubscriptionError::Closed),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                    };

                    match parse_frame(&text) {
                        Ok(Frame::Event(event)) => {
                            if sender.send(event).await.is_err() {
                                return Ok(StreamEnd::ReceiverDropped);
                            }
                        }
                        Ok(Frame::Subscribed(id)) => {
                            debug!("logsSubscribe confirmed with subscription id {}", id);
                        }
                        Ok(Frame::Error(message)) => {
                            return Err(SubscriptionError::Protocol(message));
                        }
                        Ok(Frame::Ignored) => {}
                        Err(e) => warn!("Skipping undecodable websocket frame: {}", e),
                    }
                }
                _ = shutdown_poll.tick() => {
                    if shutdown.load(Ordering::Relaxed) {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(StreamEnd::Shutdown);
                    }
                }
            }
        }
    }
}
