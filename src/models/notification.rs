//! Notification data models and API request/response types.
//!
//! This module defines:
//! - `Channel`, `Priority`, `NotificationStatus`: closed enumerations for the
//!   free-form strings stored in the database
//! - `MessageContent`: typed per-format payload (`text` / `html`)
//! - `Notification`: database entity representing the unit of work
//! - `SendRequest` / `SendResponse`: the send endpoint's request and response
//! - `NewNotification`: insert shape used by the ingress write path

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transport kind.
///
/// Stored in the database as lowercase text (inside `TEXT[]` columns), so the
/// enum carries explicit string conversions instead of a sqlx type mapping.
/// Drivers are selected by an exhaustive match on this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Push,
    Webhook,
}

impl Channel {
    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::Webhook => "webhook",
        }
    }

    /// Parse the database representation back into the enum.
    pub fn parse(s: &str) -> Option<Channel> {
        match s {
            "email" => Some(Channel::Email),
            "sms" => Some(Channel::Sms),
            "push" => Some(Channel::Push),
            "webhook" => Some(Channel::Webhook),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification priority.
///
/// Priority affects claim order only: the poller drains `urgent` before
/// `high` before `normal` before `low`. Within the in-memory job queue all
/// enqueued jobs are equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Sort rank: lower drains first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    /// Parse the database representation; unknown values sort last.
    pub fn parse(s: &str) -> Priority {
        match s {
            "urgent" => Priority::Urgent,
            "high" => Priority::High,
            "normal" => Priority::Normal,
            _ => Priority::Low,
        }
    }
}

/// Notification lifecycle status.
///
/// `pending` and `processing` are transient; `delivered` and `failed` are
/// terminal. Once terminal, the core never re-dispatches the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Processing => "processing",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Failed => "failed",
        }
    }
}

/// Per-format message payload.
///
/// `content` is an object with per-format keys; `text` and `html` are the
/// two the drivers consume. Email uses both (multipart
/// alternative), SMS and push use `text`, webhook forwards the whole object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl MessageContent {
    /// True when neither format carries a payload.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.html.is_none()
    }
}

/// Represents a notification record from the database.
///
/// # Database Table
///
/// Maps to the `notifications` table. Channel sets are `TEXT[]` columns:
/// `channels_requested` is fixed at creation, `channels_attempted` is an
/// append-only set that grows as per-channel dispatch completes. The
/// notification reaches a terminal status once every requested channel has
/// been attempted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,

    pub profile_id: Uuid,

    pub contact_id: Uuid,

    pub subject: String,

    /// Per-format payloads, rendered per channel at dispatch time
    pub content: sqlx::types::Json<MessageContent>,

    /// Substitution values for `{{key}}` tokens
    pub variables: serde_json::Value,

    pub channels_requested: Vec<String>,

    pub channels_attempted: Vec<String>,

    pub priority: String,

    /// The notification becomes eligible for claiming once this passes
    pub scheduled_at: DateTime<Utc>,

    pub status: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Requested channels not yet attempted, as the closed enum.
    ///
    /// Fan-out dispatches exactly these, so a redriven row only re-sends
    /// the channels its first claim never got to. Unknown channel names
    /// (impossible under the CHECK constraints) are dropped.
    pub fn remaining_channels(&self) -> Vec<Channel> {
        self.channels_requested
            .iter()
            .filter(|c| !self.channels_attempted.contains(c))
            .filter_map(|s| Channel::parse(s))
            .collect()
    }

    /// Claim-order priority rank for this row.
    pub fn priority_rank(&self) -> u8 {
        Priority::parse(&self.priority).rank()
    }
}

/// One recipient of a send request.
#[derive(Debug, Deserialize)]
pub struct Recipient {
    /// Contact to notify; must belong to the authenticated profile
    pub contact_id: Uuid,

    /// Per-recipient substitution values (defaults to `{}`)
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
}

/// Request body for the send endpoint.
///
/// # JSON Example
///
/// ```json
/// {
///   "recipients": [
///     { "contact_id": "550e8400-e29b-41d4-a716-446655440000",
///       "variables": { "name": "Ada" } }
///   ],
///   "subject": "Hi {{name}}",
///   "content": { "text": "Hello {{name}}" },
///   "channels": ["email", "webhook"],
///   "priority": "high",
///   "scheduled_at": "2025-06-01T09:00:00Z"
/// }
/// ```
///
/// # Validation
///
/// - `channels` must be a non-empty subset of the supported set (unknown
///   channel names are rejected during deserialization)
/// - either inline `content` or a `template_id` must be supplied
/// - every `contact_id` must belong to the authenticated profile
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub recipients: Vec<Recipient>,

    /// Optional template; its subject/content are used when the inline
    /// fields are absent
    pub template_id: Option<Uuid>,

    pub subject: Option<String>,

    pub content: Option<MessageContent>,

    pub channels: Vec<Channel>,

    #[serde(default)]
    pub priority: Priority,

    /// Future instants are honoured by the scheduled-release gate;
    /// defaults to "now"
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Response body for a successful send: one notification id per recipient.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub notifications: Vec<Uuid>,
}

/// Insert shape for a new pending notification (ingress write path).
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub profile_id: Uuid,
    pub contact_id: Uuid,
    pub subject: String,
    pub content: MessageContent,
    pub variables: serde_json::Value,
    pub channels: Vec<Channel>,
    pub priority: Priority,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_string_conversions_round_trip() {
        for channel in [Channel::Email, Channel::Sms, Channel::Push, Channel::Webhook] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("carrier-pigeon"), None);
    }

    #[test]
    fn channel_deserializes_lowercase() {
        let channels: Vec<Channel> = serde_json::from_value(json!(["email", "webhook"])).unwrap();
        assert_eq!(channels, vec![Channel::Email, Channel::Webhook]);

        // Unsupported channels are a deserialization error, caught at ingress
        let bad: Result<Vec<Channel>, _> = serde_json::from_value(json!(["fax"]));
        assert!(bad.is_err());
    }

    #[test]
    fn priority_rank_orders_urgent_first() {
        assert!(Priority::Urgent.rank() < Priority::High.rank());
        assert!(Priority::High.rank() < Priority::Normal.rank());
        assert!(Priority::Normal.rank() < Priority::Low.rank());
    }

    #[test]
    fn priority_defaults_to_normal() {
        let request: SendRequest = serde_json::from_value(json!({
            "recipients": [],
            "channels": ["email"]
        }))
        .unwrap();
        assert_eq!(request.priority, Priority::Normal);
    }

    fn notification_with_channels(requested: &[&str], attempted: &[&str]) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            contact_id: Uuid::new_v4(),
            subject: String::new(),
            content: sqlx::types::Json(MessageContent::default()),
            variables: json!({}),
            channels_requested: requested.iter().map(|s| s.to_string()).collect(),
            channels_attempted: attempted.iter().map(|s| s.to_string()).collect(),
            priority: "normal".to_string(),
            scheduled_at: Utc::now(),
            status: "pending".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn remaining_channels_skips_unknown_entries() {
        let notification = notification_with_channels(&["email", "telegraph"], &[]);
        assert_eq!(notification.remaining_channels(), vec![Channel::Email]);
    }

    #[test]
    fn remaining_channels_excludes_attempted() {
        // A redriven row only re-sends what its first claim never reached
        let notification =
            notification_with_channels(&["email", "sms", "webhook"], &["email", "webhook"]);
        assert_eq!(notification.remaining_channels(), vec![Channel::Sms]);
    }

    #[test]
    fn fully_attempted_notification_has_no_remaining_channels() {
        let notification = notification_with_channels(&["email"], &["email"]);
        assert!(notification.remaining_channels().is_empty());
    }

    #[test]
    fn message_content_empty_check() {
        assert!(MessageContent::default().is_empty());
        let content = MessageContent {
            text: Some("hi".to_string()),
            html: None,
        };
        assert!(!content.is_empty());
    }
}
