use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;

use crate::config::TelegramConfig;
use crate::error::DeliveryError;
use crate::logging::MetricsLogger;
use crate::models::{ChannelDestination, DeliveryOutcome, DispatchReport, Notification, Tier};
use crate::notify::MessageSender;

/// Destinations per tier
#[derive(Debug, Clone)]
pub struct RoutingTable {
    pub unverified: ChannelDestination,
    pub verified: ChannelDestination,
    pub broadcast: Option<ChannelDestination>,
}

impl RoutingTable {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, DeliveryError> {
        let separator = config.thread_separator.as_str();
        Ok(Self {
            unverified: ChannelDestination::parse(&config.unverified_channel, separator)?,
            verified: ChannelDestination::parse(&config.verified_channel, separator)?,
            broadcast: config
                .broadcast_channel
                .as_deref()
                .map(|channel| ChannelDestination::parse(channel, separator))
                .transpose()?,
        })
    }

    pub fn destinations(&self, tier: Tier) -> Vec<&ChannelDestination> {
        match tier {
            Tier::Unverified => vec![&self.unverified],
            Tier::Verified => {
                let mut destinations = vec![&self.verified];
                destinations.extend(self.broadcast.as_ref());
                destinations
            }
            Tier::Rejected => Vec::new(),
        }
    }
}

/// Fans a formatted message out to the channels of its tier
pub struct NotificationRouter {
    sender: Arc<dyn MessageSender>,
    routes: RoutingTable,
    parse_mode: String,
}

impl NotificationRouter {
    pub fn new(sender: Arc<dyn MessageSender>, routes: RoutingTable, parse_mode: &str) -> Self {
        Self {
            sender,
            routes,
            parse_mode: parse_mode.to_string(),
        }
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// One notification per channel routed for `tier`
    pub fn notifications(&self, tier: Tier, body: &str) -> Vec<Notification> {
        self.routes
            .destinations(tier)
            .into_iter()
            .map(|destination| Notification {
                destination: destination.clone(),
                body: body.to_string(),
            })
            .collect()
    }

    /// Deliver `body` to every channel routed for `tier`.
    ///
    /// Deliveries run concurrently and fail independently; failures are
    /// logged and recorded in the report, never returned.
    pub async fn dispatch(&self, tier: Tier, body: &str) -> DispatchReport {
        let tier_label = tier.to_string();
        let notifications = self.notifications(tier, body);
        let deliveries = notifications.iter().map(|notification| {
            let tier_label = tier_label.as_str();
            let destination = &notification.destination;
            async move {
                let started = Instant::now();
                let result = self
                    .sender
                    .send_message(destination, &notification.body, &self.parse_mode)
                    .await;
                let duration = started.elapsed().as_millis() as u64;

                match result {
                    Ok(()) => {
                        MetricsLogger::log_delivery(destination.label(), tier_label, duration, None);
                        DeliveryOutcome::delivered(destination.label())
                    }
                    Err(e) => {
                        MetricsLogger::log_delivery(
                            destination.label(),
                            tier_label,
                            duration,
                            Some(&e.to_string()),
                        );
                        DeliveryOutcome::failed(destination.label(), &e)
                    }
                }
            }
        });

        DispatchReport {
            tier,
            deliveries: join_all(deliveries).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, Option<i64>, String)>>,
        failing_chat: Option<String>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_message(
            &self,
            destination: &ChannelDestination,
            text: &str,
            parse_mode: &str,
        ) -> Result<(), DeliveryError> {
            assert_eq!(parse_mode, "Markdown");
            if self.failing_chat.as_deref() == Some(destination.chat_id.as_str()) {
                return Err(DeliveryError::Api {
                    status: 400,
                    description: "Bad Request: chat not found".to_string(),
                });
            }
            self.sent.lock().unwrap().push((
                destination.chat_id.clone(),
                destination.thread_id,
                text.to_string(),
            ));
            Ok(())
        }
    }

    fn config(broadcast: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            unverified_channel: "-100A_1".to_string(),
            verified_channel: "-100B_2".to_string(),
            broadcast_channel: broadcast.map(str::to_string),
            ..TelegramConfig::default()
        }
    }

    fn router(sender: Arc<RecordingSender>, broadcast: Option<&str>) -> NotificationRouter {
        let routes = RoutingTable::from_config(&config(broadcast)).unwrap();
        NotificationRouter::new(sender, routes, "Markdown")
    }

    #[tokio::test]
    async fn test_unverified_goes_to_one_channel() {
        let sender = Arc::new(RecordingSender::default());
        let report = router(sender.clone(), Some("-100C")).dispatch(Tier::Unverified, "body").await;

        assert_eq!(report.channels(), vec!["-100A_1"]);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("-100A".to_string(), Some(1), "body".to_string()));
    }

    #[tokio::test]
    async fn test_verified_goes_to_two_channels() {
        let sender = Arc::new(RecordingSender::default());
        let report = router(sender.clone(), Some("-100C")).dispatch(Tier::Verified, "body").await;

        assert_eq!(report.channels(), vec!["-100B_2", "-100C"]);
        assert_eq!(report.delivered_count(), 2);
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_notifications_per_destination() {
        let sender = Arc::new(RecordingSender::default());
        let router = router(sender, Some("-100C"));

        let notifications = router.notifications(Tier::Verified, "body");
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].destination.chat_id, "-100B");
        assert_eq!(notifications[0].destination.thread_id, Some(2));
        assert_eq!(notifications[1].destination.label(), "-100C");
        assert!(notifications.iter().all(|n| n.body == "body"));

        assert!(router.notifications(Tier::Rejected, "body").is_empty());
    }

    #[tokio::test]
    async fn test_verified_without_broadcast() {
        let sender = Arc::new(RecordingSender::default());
        let report = router(sender.clone(), None).dispatch(Tier::Verified, "body").await;
        assert_eq!(report.channels(), vec!["-100B_2"]);
    }

    #[tokio::test]
    async fn test_rejected_goes_nowhere() {
        let sender = Arc::new(RecordingSender::default());
        let report = router(sender.clone(), Some("-100C")).dispatch(Tier::Rejected, "body").await;
        assert!(report.deliveries.is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_channel_failure_is_isolated() {
        let sender = Arc::new(RecordingSender {
            failing_chat: Some("-100B".to_string()),
            ..RecordingSender::default()
        });
        let report = router(sender.clone(), Some("-100C")).dispatch(Tier::Verified, "body").await;

        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.delivered_count(), 1);
        assert!(!report.deliveries[0].is_success());
        assert!(report.deliveries[1].is_success());
        assert_eq!(sender.sent.lock().unwrap()[0].0, "-100C");
    }

    #[test]
    fn test_invalid_channel_config() {
        let mut bad = config(None);
        bad.verified_channel = "-100B_x".to_string();
        assert!(RoutingTable::from_config(&bad).is_err());
    }
}
