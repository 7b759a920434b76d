//! Webhook transport driver.
//!
//! POSTs a JSON payload to the recipient's own endpoint, resolved from
//! `contact.preferences.webhook_url`. Success is an HTTP 2xx within the
//! 10-second timeout. Unlike the other drivers there is no simulated path:
//! a recipient without a configured URL is a failed attempt.
//!
//! When the owning profile carries a `webhook_secret` in its settings, the
//! body is signed with HMAC-SHA256 and the signature is sent in the
//! `X-Webhook-Signature` header as `sha256=<hex>` so receivers can verify
//! authenticity with a constant-time comparison on their side.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use crate::models::delivery::{DeliveryResult, NotificationJob};
use crate::models::notification::MessageContent;
use crate::services::transports::TRANSPORT_TIMEOUT;

type HmacSha256 = Hmac<Sha256>;

/// Error message recorded when the recipient has no webhook destination.
pub const NO_WEBHOOK_URL_ERROR: &str = "No webhook URL configured";

/// JSON body sent to the recipient's endpoint.
///
/// `subject` and `content` are the rendered forms; `variables` rides along
/// so receivers can apply their own templating if they prefer.
#[derive(Debug, Serialize)]
pub struct WebhookDeliveryPayload<'a> {
    pub notification_id: Uuid,
    pub contact_id: Uuid,
    pub subject: &'a str,
    pub content: &'a MessageContent,
    pub variables: &'a serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Deliver one webhook job.
pub async fn deliver(
    http: &reqwest::Client,
    job: &NotificationJob,
    subject: &str,
    content: &MessageContent,
) -> DeliveryResult {
    let Some(destination) = job.contact.webhook_url() else {
        return DeliveryResult::failure(job, NO_WEBHOOK_URL_ERROR);
    };

    if url::Url::parse(destination).is_err() {
        return DeliveryResult::failure(
            job,
            format!("Invalid webhook URL: {}", destination),
        );
    }

    let payload = WebhookDeliveryPayload {
        notification_id: job.notification_id,
        contact_id: job.contact.id,
        subject,
        content,
        variables: &job.variables,
        timestamp: Utc::now(),
    };
    let body = match serde_json::to_string(&payload) {
        Ok(b) => b,
        Err(e) => {
            return DeliveryResult::failure(job, format!("Failed to serialize payload: {}", e));
        }
    };

    let mut request = http
        .post(destination)
        .header("Content-Type", "application/json")
        .timeout(TRANSPORT_TIMEOUT);

    // Sign the exact bytes we send, when the tenant has a secret configured
    if let Some(secret) = job.webhook_secret.as_deref() {
        request = request.header("X-Webhook-Signature", sign_payload(secret, &body));
    }

    match request.body(body).send().await {
        Ok(resp) if resp.status().is_success() => DeliveryResult::success(
            job,
            json!({
                "simulated": false,
                "url": destination,
                "status": resp.status().as_u16(),
            }),
        ),
        Ok(resp) => DeliveryResult::failure(
            job,
            format!("Webhook returned status {}", resp.status().as_u16()),
        ),
        Err(e) if e.is_timeout() => {
            DeliveryResult::failure(job, "Webhook request timed out".to_string())
        }
        Err(e) => DeliveryResult::failure(job, format!("Webhook request failed: {}", e)),
    }
}

/// HMAC-SHA256 signature over the payload, formatted `sha256=<hex>`.
fn sign_payload(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contact::Contact;
    use crate::models::notification::Channel;

    fn webhook_job(preferences: serde_json::Value) -> NotificationJob {
        NotificationJob {
            notification_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            contact: Contact {
                id: Uuid::new_v4(),
                profile_id: Uuid::new_v4(),
                external_id: "user-1".to_string(),
                identifier: "c@x.test".to_string(),
                first_name: None,
                last_name: None,
                timezone: None,
                locale: None,
                preferences,
                status: "active".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            channel: Channel::Webhook,
            subject: "Hi".to_string(),
            content: MessageContent {
                text: Some("Hello".to_string()),
                html: None,
            },
            variables: json!({}),
            webhook_secret: None,
        }
    }

    #[tokio::test]
    async fn missing_url_fails_with_exact_message() {
        let job = webhook_job(json!({}));
        let result = deliver(&reqwest::Client::new(), &job, "Hi", &job.content).await;

        assert!(!result.success);
        assert_eq!(result.error, "No webhook URL configured");
    }

    #[tokio::test]
    async fn malformed_url_fails_without_sending() {
        let job = webhook_job(json!({"webhook_url": "not a url"}));
        let result = deliver(&reqwest::Client::new(), &job, "Hi", &job.content).await;

        assert!(!result.success);
        assert!(result.error.starts_with("Invalid webhook URL"));
    }

    #[test]
    fn payload_contains_contract_fields() {
        let job = webhook_job(json!({"webhook_url": "https://example.com/hook"}));
        let payload = WebhookDeliveryPayload {
            notification_id: job.notification_id,
            contact_id: job.contact.id,
            subject: "Hi",
            content: &job.content,
            variables: &job.variables,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["notification_id"], json!(job.notification_id));
        assert_eq!(value["contact_id"], json!(job.contact.id));
        assert_eq!(value["subject"], json!("Hi"));
        assert_eq!(value["content"]["text"], json!("Hello"));
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn signature_has_sha256_prefix_and_is_stable() {
        let first = sign_payload("secret", "{\"a\":1}");
        let second = sign_payload("secret", "{\"a\":1}");

        assert!(first.starts_with("sha256="));
        assert_eq!(first.len(), "sha256=".len() + 64);
        assert_eq!(first, second);
        assert_ne!(first, sign_payload("other", "{\"a\":1}"));
    }
}
