//! Delivery models: per-channel jobs and their recorded outcomes.
//!
//! A notification fans out into one `NotificationJob` per requested channel.
//! Each job resolves to exactly one `DeliveryResult`, which is persisted as a
//! `delivery_logs` row and mirrored into the cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::contact::Contact;
use crate::models::notification::{Channel, MessageContent};

/// One unit of dispatch work: a single `(notification, channel)` pair.
///
/// Built by the dispatcher's fan-out and consumed by a worker. Carries the
/// unrendered subject/content plus the substitution variables; the worker
/// renders immediately before invoking the transport driver.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub notification_id: Uuid,

    pub profile_id: Uuid,

    /// Recipient, loaded once per notification at fan-out time
    pub contact: Contact,

    pub channel: Channel,

    pub subject: String,

    pub content: MessageContent,

    /// Substitution values for `{{key}}` tokens
    pub variables: serde_json::Value,

    /// Per-tenant secret for signing webhook deliveries, when configured
    pub webhook_secret: Option<String>,
}

/// Outcome of one channel attempt.
///
/// Append-only: inserted into `delivery_logs` and mirrored into the cache.
/// A failed result does not fail the notification; terminal status is
/// decided from the aggregate of all channels' outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub notification_id: Uuid,

    pub channel: Channel,

    pub success: bool,

    /// Empty on success, carrier/policy message on failure
    pub error: String,

    pub delivered_at: DateTime<Utc>,

    /// Opaque driver annotations (destination, provider ids, `simulated` flag)
    pub metadata: serde_json::Value,
}

impl DeliveryResult {
    /// Successful attempt with driver-provided metadata.
    pub fn success(job: &NotificationJob, metadata: serde_json::Value) -> Self {
        Self {
            notification_id: job.notification_id,
            channel: job.channel,
            success: true,
            error: String::new(),
            delivered_at: Utc::now(),
            metadata,
        }
    }

    /// Failed attempt with an error message.
    pub fn failure(job: &NotificationJob, error: impl Into<String>) -> Self {
        Self {
            notification_id: job.notification_id,
            channel: job.channel,
            success: false,
            error: error.into(),
            delivered_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    /// Successful attempt on the simulated provider path.
    ///
    /// Taken when a transport has no provider configured; always succeeds and
    /// tags the metadata with `simulated: true` so operators can tell the two
    /// apart in the logs.
    pub fn simulated(job: &NotificationJob) -> Self {
        Self::success(
            job,
            serde_json::json!({
                "simulated": true,
                "to": job.contact.identifier,
            }),
        )
    }
}

/// Represents a delivery log record from the database.
///
/// # Database Table
///
/// Maps to the `delivery_logs` table. Multiple rows per
/// `(notification_id, channel)` pair are permitted so operator-driven
/// redrives keep their full history.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DeliveryLog {
    pub id: Uuid,

    pub notification_id: Uuid,

    pub channel: String,

    pub success: bool,

    pub error: String,

    pub delivered_at: DateTime<Utc>,

    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn job() -> NotificationJob {
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
                preferences: json!({}),
                status: "active".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            channel: Channel::Email,
            subject: "Hi".to_string(),
            content: MessageContent::default(),
            variables: json!({}),
            webhook_secret: None,
        }
    }

    #[test]
    fn simulated_result_tags_metadata() {
        let result = DeliveryResult::simulated(&job());
        assert!(result.success);
        assert!(result.error.is_empty());
        assert_eq!(result.metadata["simulated"], json!(true));
        assert_eq!(result.metadata["to"], json!("c@x.test"));
    }

    #[test]
    fn failure_result_carries_message() {
        let result = DeliveryResult::failure(&job(), "connection refused");
        assert!(!result.success);
        assert_eq!(result.error, "connection refused");
    }
}
