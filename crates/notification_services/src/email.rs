use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;

use crate::channel::NotificationChannel;
use crate::types::{Delivery, EmailConfig, NotificationError};

/// Subject line for every availability email.
pub const EMAIL_SUBJECT: &str = "Course Seat Available!";

/// SMTP email channel using STARTTLS.
pub struct SmtpEmailChannel {
    smtp_server: String,
    smtp_port: u16,
    from_email: String,
    to_email: String,
    password: Option<String>,
}

impl SmtpEmailChannel {
    /// Build the channel from config. `EMAIL_PASSWORD` from `lookup` takes
    /// priority over the configured password.
    pub fn from_config_with<F>(config: &EmailConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let password = lookup("EMAIL_PASSWORD")
            .filter(|p| !p.is_empty())
            .or_else(|| config.password.clone().filter(|p| !p.is_empty()));

        Self {
            smtp_server: config.smtp_server.clone(),
            smtp_port: config.smtp_port,
            from_email: config.from_email.clone(),
            to_email: config.to_email.clone(),
            password,
        }
    }

    fn build_message(&self, message: &str, detail: &Value) -> Result<Message, NotificationError> {
        let from: Mailbox = self
            .from_email
            .parse()
            .map_err(|e| NotificationError::Email(format!("Invalid sender address: {}", e)))?;
        let to: Mailbox = self
            .to_email
            .parse()
            .map_err(|e| NotificationError::Email(format!("Invalid recipient address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(compose_body(message, detail))
            .map_err(|e| NotificationError::Email(format!("Failed to build message: {}", e)))
    }
}

/// Plaintext body: the human message followed by the serialized details.
pub fn compose_body(message: &str, detail: &Value) -> String {
    let has_detail = match detail {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    };

    if !has_detail {
        return message.to_string();
    }

    let rendered = serde_json::to_string_pretty(detail).unwrap_or_else(|_| detail.to_string());
    format!("{}\n\nDetails: {}", message, rendered)
}

#[async_trait]
impl NotificationChannel for SmtpEmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, message: &str, detail: &Value) -> Result<Delivery, NotificationError> {
        if self.from_email.is_empty() || self.to_email.is_empty() {
            log::warn!("Email addresses not configured");
            return Ok(Delivery::Skipped("email addresses not configured".to_string()));
        }

        let email = self.build_message(message, detail)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_server)
            .map_err(|e| NotificationError::Email(format!("Invalid SMTP relay: {}", e)))?
            .port(self.smtp_port);

        if let Some(ref password) = self.password {
            builder = builder.credentials(Credentials::new(
                self.from_email.clone(),
                password.clone(),
            ));
        }

        log::info!("📧 Sending email via {}:{}...", self.smtp_server, self.smtp_port);

        let response = builder
            .build()
            .send(email)
            .await
            .map_err(|e| NotificationError::Email(e.to_string()))?;

        log::info!("✅ Email notification sent to {}", self.to_email);
        Ok(Delivery::Sent(response.message().next().map(str::to_string)))
    }
}
