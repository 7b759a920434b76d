//! Push transport driver.
//!
//! `PUSH_SERVICE=fcm` with a server key routes through the FCM send API;
//! anything else simulates delivery. The contact identifier is the device
//! token.

use serde_json::json;

use crate::config::Config;
use crate::models::delivery::{DeliveryResult, NotificationJob};
use crate::models::notification::MessageContent;
use crate::services::transports::TRANSPORT_TIMEOUT;

const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// Push driver: FCM or the simulated path.
pub enum PushTransport {
    Fcm { server_key: String },
    Simulated,
}

impl PushTransport {
    /// Build the driver from configuration.
    pub fn from_config(config: &Config) -> Self {
        if config.push_service.as_deref() != Some("fcm") {
            tracing::info!("Push service not configured, push driver will simulate deliveries");
            return PushTransport::Simulated;
        }

        match &config.fcm_server_key {
            Some(key) => {
                tracing::info!("Push driver configured for FCM delivery");
                PushTransport::Fcm {
                    server_key: key.clone(),
                }
            }
            None => {
                tracing::warn!("PUSH_SERVICE=fcm but FCM_SERVER_KEY is missing, simulating instead");
                PushTransport::Simulated
            }
        }
    }

    /// Deliver one push job as a display notification (title + body).
    pub async fn deliver(
        &self,
        http: &reqwest::Client,
        job: &NotificationJob,
        subject: &str,
        content: &MessageContent,
    ) -> DeliveryResult {
        let PushTransport::Fcm { server_key } = self else {
            return DeliveryResult::simulated(job);
        };

        let payload = json!({
            "to": job.contact.identifier,
            "notification": {
                "title": subject,
                "body": content.text.as_deref().unwrap_or_default(),
            },
        });

        let response = http
            .post(FCM_SEND_URL)
            .header("Authorization", format!("key={}", server_key))
            .json(&payload)
            .timeout(TRANSPORT_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => DeliveryResult::success(
                job,
                json!({
                    "simulated": false,
                    "to": job.contact.identifier,
                    "provider": "fcm",
                }),
            ),
            Ok(resp) => DeliveryResult::failure(
                job,
                format!("FCM returned status {}", resp.status().as_u16()),
            ),
            Err(e) => DeliveryResult::failure(job, format!("FCM request failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contact::Contact;
    use crate::models::notification::Channel;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn unconfigured_service_simulates_success() {
        let job = NotificationJob {
            notification_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            contact: Contact {
                id: Uuid::new_v4(),
                profile_id: Uuid::new_v4(),
                external_id: "user-1".to_string(),
                identifier: "device-token-abc".to_string(),
                first_name: None,
                last_name: None,
                timezone: None,
                locale: None,
                preferences: json!({}),
                status: "active".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            channel: Channel::Push,
            subject: "Hi".to_string(),
            content: MessageContent::default(),
            variables: json!({}),
            webhook_secret: None,
        };

        let result = PushTransport::Simulated
            .deliver(&reqwest::Client::new(), &job, "Hi", &job.content)
            .await;

        assert!(result.success);
        assert_eq!(result.metadata["simulated"], json!(true));
        assert_eq!(result.metadata["to"], json!("device-token-abc"));
    }
}
