use std::fmt;

use serde::Deserialize;

/// Errors raised by a single notification channel.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Twilio rejected or failed the SMS request.
    #[error("SMS error: {0}")]
    Sms(String),

    /// The SMTP exchange failed.
    #[error("Email error: {0}")]
    Email(String),

    /// The channel is enabled but its configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outcome of one channel delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The provider accepted the message, with its message id when known.
    Sent(Option<String>),
    /// The channel did nothing, with the reason.
    Skipped(String),
}

/// Per-channel settings for every supported delivery mechanism.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// SMTP email channel.
    pub email: EmailConfig,
    /// Twilio SMS channel.
    pub twilio: TwilioConfig,
    /// Push channel (stub).
    pub push: PushConfig,
}

/// SMTP email settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Whether the channel is active.
    pub enabled: bool,
    /// SMTP relay host.
    pub smtp_server: String,
    /// SMTP submission port (STARTTLS).
    pub smtp_port: u16,
    /// Sender address, also used as the SMTP login.
    pub from_email: String,
    /// Recipient address.
    pub to_email: String,
    /// SMTP password. `EMAIL_PASSWORD` in the environment wins over this.
    pub password: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            from_email: String::new(),
            to_email: String::new(),
            password: None,
        }
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("enabled", &self.enabled)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("from_email", &self.from_email)
            .field("to_email", &self.to_email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Twilio SMS settings.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    /// Whether the channel is active.
    pub enabled: bool,
    /// Account SID. `TWILIO_ACCOUNT_SID` in the environment wins over this.
    pub account_sid: String,
    /// Auth token. `TWILIO_AUTH_TOKEN` in the environment wins over this.
    pub auth_token: String,
    /// Sending number in E.164 format.
    pub from_number: String,
    /// Receiving number in E.164 format.
    pub to_number: String,
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("enabled", &self.enabled)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .finish()
    }
}

/// Push settings. Delivery is not implemented.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Whether the stub should be invoked.
    pub enabled: bool,
}

/// Ensure phone number is in E.164 format
pub fn format_phone_number(phone: &str) -> String {
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{}", phone.replace(['(', ')', '-', ' ', '.'], ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: NotificationsConfig =
            serde_json::from_str(r#"{"email": {"enabled": true, "to_email": "me@example.com"}}"#)
                .unwrap();

        assert!(config.email.enabled);
        assert_eq!(config.email.smtp_server, "smtp.gmail.com");
        assert_eq!(config.email.smtp_port, 587);
        assert!(!config.twilio.enabled);
        assert!(!config.push.enabled);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config: NotificationsConfig = serde_json::from_str(
            r#"{
                "email": {"password": "mail-secret"},
                "twilio": {"account_sid": "AC123", "auth_token": "token-secret"}
            }"#,
        )
        .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("mail-secret"));
        assert!(!debug.contains("token-secret"));
        assert!(debug.contains("AC123"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number("+923001234567"), "+923001234567");
        assert_eq!(format_phone_number("1 (555) 123-4567"), "+15551234567");
    }
}
