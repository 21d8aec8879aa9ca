pub mod message;
pub mod router;
pub mod telegram;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::models::ChannelDestination;

pub use message::{escape_markdown, MessageFormatter};
pub use router::{NotificationRouter, RoutingTable};
pub use telegram::TelegramClient;

/// Transport that posts a text message to one channel
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(
        &self,
        destination: &ChannelDestination,
        text: &str,
        parse_mode: &str,
    ) -> Result<(), DeliveryError>;
}
