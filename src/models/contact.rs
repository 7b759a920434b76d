//! Contact model - the notification recipient.
//!
//! A contact is owned by exactly one profile and addressed by its
//! `identifier`: an email address, a phone number, a device token, or
//! whatever the requested channel needs. Channel-specific extras (like a
//! per-recipient webhook URL) live in the opaque `preferences` bag.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a contact record from the database.
///
/// # Database Table
///
/// Maps to the `contacts` table. `(profile_id, external_id)` is unique within
/// a tenant so callers can use their own recipient identifiers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Contact {
    /// Unique identifier for this contact
    pub id: Uuid,

    /// Owning tenant
    pub profile_id: Uuid,

    /// Tenant-supplied recipient id, unique per tenant
    pub external_id: String,

    /// Channel-addressable identity (email / phone / device token)
    pub identifier: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    /// IANA timezone name, informational only for the dispatch core
    pub timezone: Option<String>,

    pub locale: Option<String>,

    /// Opaque per-recipient preference bag
    ///
    /// The webhook driver reads `webhook_url` from here to resolve its
    /// destination; everything else passes through untouched.
    pub preferences: serde_json::Value,

    pub status: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Destination URL for webhook deliveries, if the recipient has one.
    pub fn webhook_url(&self) -> Option<&str> {
        self.preferences.get("webhook_url").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact_with_preferences(preferences: serde_json::Value) -> Contact {
        Contact {
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
        }
    }

    #[test]
    fn webhook_url_read_from_preferences() {
        let contact =
            contact_with_preferences(json!({"webhook_url": "https://example.com/hook"}));
        assert_eq!(contact.webhook_url(), Some("https://example.com/hook"));
    }

    #[test]
    fn webhook_url_missing() {
        let contact = contact_with_preferences(json!({"digest": "weekly"}));
        assert_eq!(contact.webhook_url(), None);
    }
}
