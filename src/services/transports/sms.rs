//! SMS transport driver.
//!
//! `SMS_PROVIDER=twilio` with full credentials routes messages through the
//! Twilio Messages API; anything else simulates delivery. The text-format
//! payload is the message body; HTML never reaches SMS.

use serde_json::json;

use crate::config::Config;
use crate::models::delivery::{DeliveryResult, NotificationJob};
use crate::models::notification::MessageContent;
use crate::services::transports::TRANSPORT_TIMEOUT;

/// SMS driver: Twilio or the simulated path.
pub enum SmsTransport {
    Twilio {
        account_sid: String,
        auth_token: String,
        from_number: String,
    },
    Simulated,
}

impl SmsTransport {
    /// Build the driver from configuration.
    ///
    /// Selecting `twilio` without its three credentials is treated as
    /// unconfigured rather than a startup failure; the driver simulates and
    /// says so in the logs.
    pub fn from_config(config: &Config) -> Self {
        if config.sms_provider.as_deref() != Some("twilio") {
            tracing::info!("SMS provider not configured, SMS driver will simulate deliveries");
            return SmsTransport::Simulated;
        }

        match (
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_from_number,
        ) {
            (Some(sid), Some(token), Some(from)) => {
                tracing::info!("SMS driver configured for Twilio delivery");
                SmsTransport::Twilio {
                    account_sid: sid.clone(),
                    auth_token: token.clone(),
                    from_number: from.clone(),
                }
            }
            _ => {
                tracing::warn!(
                    "SMS_PROVIDER=twilio but credentials are incomplete, simulating instead"
                );
                SmsTransport::Simulated
            }
        }
    }

    /// Deliver one SMS job. The contact identifier is the destination number.
    pub async fn deliver(
        &self,
        http: &reqwest::Client,
        job: &NotificationJob,
        content: &MessageContent,
    ) -> DeliveryResult {
        let SmsTransport::Twilio {
            account_sid,
            auth_token,
            from_number,
        } = self
        else {
            return DeliveryResult::simulated(job);
        };

        let Some(body) = content.text.as_deref() else {
            return DeliveryResult::failure(job, "No text content for SMS");
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            account_sid
        );
        let params = [
            ("To", job.contact.identifier.as_str()),
            ("From", from_number.as_str()),
            ("Body", body),
        ];

        let response = http
            .post(&url)
            .basic_auth(account_sid, Some(auth_token))
            .form(&params)
            .timeout(TRANSPORT_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => DeliveryResult::success(
                job,
                json!({
                    "simulated": false,
                    "to": job.contact.identifier,
                    "provider": "twilio",
                }),
            ),
            Ok(resp) => DeliveryResult::failure(
                job,
                format!("Twilio returned status {}", resp.status().as_u16()),
            ),
            Err(e) => DeliveryResult::failure(job, format!("Twilio request failed: {}", e)),
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
    async fn unconfigured_provider_simulates_success() {
        let job = NotificationJob {
            notification_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            contact: Contact {
                id: Uuid::new_v4(),
                profile_id: Uuid::new_v4(),
                external_id: "user-1".to_string(),
                identifier: "+15551234567".to_string(),
                first_name: None,
                last_name: None,
                timezone: None,
                locale: None,
                preferences: json!({}),
                status: "active".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            channel: Channel::Sms,
            subject: String::new(),
            content: MessageContent {
                text: Some("ping".to_string()),
                html: None,
            },
            variables: json!({}),
            webhook_secret: None,
        };

        let result = SmsTransport::Simulated
            .deliver(&reqwest::Client::new(), &job, &job.content)
            .await;

        assert!(result.success);
        assert_eq!(result.metadata["simulated"], json!(true));
    }
}
