use async_trait::async_trait;
use serde_json::Value;

use crate::types::{Delivery, NotificationError};

/// One delivery mechanism (SMS, email, push).
///
/// Channels are invoked independently by [`crate::NotificationService`]; an
/// error returned here is logged by the service and never stops the other
/// channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short channel name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Deliver `message`, with `detail` as structured context where the
    /// channel has room for it.
    async fn send(&self, message: &str, detail: &Value) -> Result<Delivery, NotificationError>;
}
