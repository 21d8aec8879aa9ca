use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DeliveryError;
use crate::logging::LogContext;
use crate::models::ChannelDestination;
use crate::notify::MessageSender;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Telegram Bot API `sendMessage` client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, bot_token: &str, timeout_seconds: u64) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(
        &self,
        destination: &ChannelDestination,
        text: &str,
        parse_mode: &str,
    ) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id: &destination.chat_id,
            message_thread_id: destination.thread_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        let response = self.client.post(self.endpoint()).json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TelegramResponse = serde_json::from_str(&body).unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parsed
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(1);
            return Err(DeliveryError::RateLimited { retry_after });
        }

        if !status.is_success() || !parsed.ok {
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                description: parsed
                    .description
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string()),
            });
        }

        LogContext::new("telegram", "send_message")
            .with_channel(destination.label())
            .trace("Telegram accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_with_thread() {
        let dest = ChannelDestination::parse("-1002149791590_797", "_").unwrap();
        let request = SendMessageRequest {
            chat_id: &dest.chat_id,
            message_thread_id: dest.thread_id,
            text: "hello",
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_id"], "-1002149791590");
        assert_eq!(json["message_thread_id"], 797);
        assert_eq!(json["parse_mode"], "Markdown");
        assert_eq!(json["disable_web_page_preview"], true);
    }

    #[test]
    fn test_request_without_thread_omits_field() {
        let request = SendMessageRequest {
            chat_id: "-100123",
            message_thread_id: None,
            text: "hello",
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("message_thread_id").is_none());
    }

    #[test]
    fn test_endpoint_format() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc", 10).unwrap();
        assert_eq!(client.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[test]
    fn test_error_response_parsing() {
        let parsed: TelegramResponse = serde_json::from_str(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#,
        )
        .unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.parameters.and_then(|p| p.retry_after), Some(7));
    }
}
