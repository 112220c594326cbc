//! Webhook delivery channel for the NetShield service.
//!
//! Posts JSON-rendered notifications to a configured endpoint. Delivery is
//! best-effort; a failed post is reported to the caller and logged there,
//! never escalated.

use std::time::Duration;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::core::notifier::Notification;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur during webhook delivery
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Endpoint rejected notification: {0}")]
    Rejected(String),
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    title: &'static str,
    message: String,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// Webhook client
pub struct WebhookClient {
    /// HTTP client
    client: Client,
    /// Target URL
    url: String,
}

impl WebhookClient {
    /// Create a new webhook client for the given URL
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver one notification
    pub async fn send(&self, notification: &Notification) -> Result<(), WebhookError> {
        let payload = WebhookPayload {
            title: "NetShield Alert",
            message: notification.message(),
            notification,
        };

        let response = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WebhookError::Rejected(response.status().to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use crate::core::classifier::AttackType;

    #[test]
    fn test_payload_renders_notification_message() {
        let notification = Notification::CriticalAlert {
            alert_id: Uuid::new_v4(),
            attack_type: AttackType::U2R,
            source_ip: "192.168.1.100".to_string(),
        };
        let payload = WebhookPayload {
            title: "NetShield Alert",
            message: notification.message(),
            notification: &notification,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["title"], "NetShield Alert");
        assert_eq!(json["kind"], "critical_alert");
        assert_eq!(
            json["message"],
            "Critical security alert: U2R detected from 192.168.1.100"
        );
    }

    #[test]
    fn test_client_keeps_configured_url() {
        let client = WebhookClient::new("https://hooks.example.com/netshield".to_string());
        assert_eq!(client.url(), "https://hooks.example.com/netshield");
    }
}
