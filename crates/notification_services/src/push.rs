use async_trait::async_trait;
use serde_json::Value;

use crate::channel::NotificationChannel;
use crate::types::{Delivery, NotificationError};

/// Placeholder push channel. Records the invocation and delivers nothing.
pub struct PushChannel;

#[async_trait]
impl NotificationChannel for PushChannel {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn send(&self, _message: &str, _detail: &Value) -> Result<Delivery, NotificationError> {
        log::info!("Push notification (not implemented)");
        Ok(Delivery::Skipped("push delivery not implemented".to_string()))
    }
}
