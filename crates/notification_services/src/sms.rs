use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::channel::NotificationChannel;
use crate::types::{Delivery, NotificationError, TwilioConfig, format_phone_number};

const TWILIO_API_URL: &str = "https://api.twilio.com";

/// Twilio SMS channel.
pub struct TwilioSmsChannel {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: Option<String>,
}

impl TwilioSmsChannel {
    /// Build the channel from config, letting `lookup` override the account
    /// credentials (`TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`).
    pub fn from_config_with<F>(config: &TwilioConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, fallback: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        Self {
            client: Client::new(),
            base_url: TWILIO_API_URL.to_string(),
            account_sid: pick("TWILIO_ACCOUNT_SID", &config.account_sid),
            auth_token: pick("TWILIO_AUTH_TOKEN", &config.auth_token),
            from_number: config.from_number.clone(),
            to_number: config.to_number.clone(),
        }
    }

    /// Point the channel at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for TwilioSmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, message: &str, _detail: &Value) -> Result<Delivery, NotificationError> {
        if self.from_number.is_empty() || self.to_number.is_empty() {
            log::warn!("Twilio phone numbers not configured");
            return Ok(Delivery::Skipped("phone numbers not configured".to_string()));
        }

        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            log::warn!("Twilio credentials not configured");
            return Ok(Delivery::Skipped("credentials not configured".to_string()));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let to = format_phone_number(&self.to_number);
        let from = format_phone_number(&self.from_number);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", message)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotificationError::Sms(format!(
                "Twilio returned {}: {}",
                status, error_text
            )));
        }

        let body: TwilioMessageResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Sms(format!("Failed to parse response: {}", e)))?;

        log::info!("📱 SMS notification sent to {}", to);
        Ok(Delivery::Sent(body.sid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config() -> TwilioConfig {
        TwilioConfig {
            enabled: true,
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_number: "+15550001".to_string(),
            to_number: "+15550002".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sms_posts_message_to_twilio() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("To".to_string(), "+15550002".to_string()),
                Matcher::UrlEncoded("From".to_string(), "+15550001".to_string()),
                Matcher::UrlEncoded("Body".to_string(), "seats open".to_string()),
            ]))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sid": "SM42", "status": "queued"}"#)
            .create_async()
            .await;

        let channel = TwilioSmsChannel::from_config_with(&config(), |_| None)
            .with_base_url(server.url());
        let delivery = channel.send("seats open", &Value::Null).await.unwrap();

        assert_eq!(delivery, Delivery::Sent(Some("SM42".to_string())));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sms_rejected_request_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .with_status(400)
            .with_body(r#"{"message": "invalid To number"}"#)
            .create_async()
            .await;

        let channel = TwilioSmsChannel::from_config_with(&config(), |_| None)
            .with_base_url(server.url());
        let result = channel.send("seats open", &Value::Null).await;

        assert!(matches!(result, Err(NotificationError::Sms(_))));
    }

    #[tokio::test]
    async fn test_sms_without_numbers_is_skipped() {
        let mut config = config();
        config.to_number.clear();

        let channel = TwilioSmsChannel::from_config_with(&config, |_| None)
            .with_base_url("http://127.0.0.1:9");
        let delivery = channel.send("seats open", &Value::Null).await.unwrap();

        assert!(matches!(delivery, Delivery::Skipped(_)));
    }

    #[test]
    fn test_environment_credentials_take_priority() {
        let channel = TwilioSmsChannel::from_config_with(&config(), |key| match key {
            "TWILIO_ACCOUNT_SID" => Some("ACenv".to_string()),
            "TWILIO_AUTH_TOKEN" => Some(String::new()),
            _ => None,
        });

        assert_eq!(channel.account_sid, "ACenv");
        // Empty values fall back to config.
        assert_eq!(channel.auth_token, "secret");
    }
}
