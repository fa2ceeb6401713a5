use async_trait::async_trait;
use serde_json::Value;

use crate::channel::NotificationChannel;
use crate::email::SmtpEmailChannel;
use crate::push::PushChannel;
use crate::sms::TwilioSmsChannel;
use crate::types::{Delivery, NotificationsConfig};

/// Anything that can announce a seat opening.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` with `detail` as context. Never fails: delivery
    /// problems are logged and summarized in the report.
    async fn notify(&self, message: &str, detail: &Value) -> NotificationReport;
}

/// Summary of one fan-out across all channels.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    /// Channels whose provider accepted the message.
    pub delivered: Vec<&'static str>,
    /// Channels that chose not to send (missing addresses, stubs).
    pub skipped: Vec<&'static str>,
    /// Channels that raised an error.
    pub failed: Vec<&'static str>,
}

impl NotificationReport {
    /// Number of channels that were invoked.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.skipped.len() + self.failed.len()
    }
}

/// Fans a notification out to every enabled channel.
pub struct NotificationService {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationService {
    /// Creates a service over an explicit channel list.
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Creates the service from config, reading credential overrides from the
    /// process environment.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self::from_config_with(config, |key| std::env::var(key).ok())
    }

    /// Creates the service from config with an explicit credential lookup.
    pub fn from_config_with<F>(config: &NotificationsConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if config.twilio.enabled {
            channels.push(Box::new(TwilioSmsChannel::from_config_with(
                &config.twilio,
                &lookup,
            )));
        }

        if config.email.enabled {
            channels.push(Box::new(SmtpEmailChannel::from_config_with(
                &config.email,
                &lookup,
            )));
        }

        if config.push.enabled {
            channels.push(Box::new(PushChannel));
        }

        if channels.is_empty() {
            log::warn!("⚠️ No notification channels enabled; transitions will only be logged");
        } else {
            log::info!(
                "🔔 Notification channels enabled: {}",
                channels.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
            );
        }

        Self { channels }
    }

    /// Names of the active channels, in delivery order.
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn notify(&self, message: &str, detail: &Value) -> NotificationReport {
        let mut report = NotificationReport::default();

        // Each channel is independent: one failure must not block the rest.
        for channel in &self.channels {
            match channel.send(message, detail).await {
                Ok(Delivery::Sent(external_id)) => {
                    log::info!(
                        "{} notification delivered (id: {})",
                        channel.name(),
                        external_id.as_deref().unwrap_or("n/a")
                    );
                    report.delivered.push(channel.name());
                }
                Ok(Delivery::Skipped(reason)) => {
                    log::debug!("{} notification skipped: {}", channel.name(), reason);
                    report.skipped.push(channel.name());
                }
                Err(e) => {
                    log::error!("❌ Failed to send {} notification: {}", channel.name(), e);
                    report.failed.push(channel.name());
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::{NotificationError, TwilioConfig};

    struct RecordingChannel {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, _message: &str, _detail: &Value) -> Result<Delivery, NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotificationError::Sms("provider down".to_string()))
            } else {
                Ok(Delivery::Sent(None))
            }
        }
    }

    #[tokio::test]
    async fn test_sms_without_numbers_does_not_block_other_channels() {
        let config = TwilioConfig {
            enabled: true,
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            ..TwilioConfig::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let service = NotificationService::new(vec![
            Box::new(TwilioSmsChannel::from_config_with(&config, |_| None)),
            Box::new(RecordingChannel {
                calls: calls.clone(),
                fail: false,
            }),
        ]);

        let report = service.notify("Seats open", &Value::Null).await;

        assert_eq!(report.skipped, vec!["sms"]);
        assert_eq!(report.delivered, vec!["recording"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_channel_is_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = NotificationService::new(vec![
            Box::new(RecordingChannel {
                calls: calls.clone(),
                fail: true,
            }),
            Box::new(PushChannel),
            Box::new(RecordingChannel {
                calls: calls.clone(),
                fail: false,
            }),
        ]);

        let report = service.notify("Seats open", &Value::Null).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.skipped, vec!["push"]);
        assert_eq!(report.delivered.len(), 1);
        assert_eq!(report.attempted(), 3);
    }

    #[test]
    fn test_only_enabled_channels_are_built() {
        let mut config = NotificationsConfig::default();
        config.email.enabled = true;
        config.push.enabled = true;

        let service = NotificationService::from_config_with(&config, |_| None);
        assert_eq!(service.channel_names(), vec!["email", "push"]);

        let service = NotificationService::from_config_with(&NotificationsConfig::default(), |_| None);
        assert!(service.channel_names().is_empty());
    }
}
