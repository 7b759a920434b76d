//! Profile model - the tenant identity.
//!
//! Every contact, template, notification, and delivery log is owned by exactly
//! one profile. Profiles are created externally (admin tooling); the core only
//! reads them to authenticate requests and to resolve per-tenant settings.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a profile (tenant) record from the database.
///
/// # Database Table
///
/// Maps to the `profiles` table.
///
/// # API Key Storage
///
/// The plaintext API key is never stored. `api_key_hash` holds its SHA-256
/// hash; `api_key_prefix` holds the first characters of the key so
/// authentication can locate the row with an indexed lookup before verifying
/// the hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    /// Unique identifier for this tenant
    pub id: Uuid,

    /// URL-safe tenant tag, used in request paths
    pub slug: String,

    /// Human-readable tenant name
    pub name: String,

    /// SHA-256 hash of the API key (64 hex characters)
    pub api_key_hash: String,

    /// Short prefix of the plaintext key for indexed lookup
    pub api_key_prefix: String,

    /// Billing plan tag (opaque to the dispatch core)
    pub plan: String,

    /// Either "active" or "suspended"; suspended tenants cannot send
    pub status: String,

    /// Opaque per-tenant settings bag
    ///
    /// The dispatch core reads only `webhook_secret` from here, to sign
    /// outbound webhook deliveries.
    pub settings: serde_json::Value,

    /// Timestamp when this profile was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last profile update
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Per-tenant secret used to sign outbound webhook deliveries, if set.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.settings.get("webhook_secret").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile_with_settings(settings: serde_json::Value) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            slug: "acme".to_string(),
            name: "Acme Corp".to_string(),
            api_key_hash: String::new(),
            api_key_prefix: String::new(),
            plan: "free".to_string(),
            status: "active".to_string(),
            settings,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn webhook_secret_read_from_settings() {
        let profile = profile_with_settings(json!({"webhook_secret": "s3cret"}));
        assert_eq!(profile.webhook_secret(), Some("s3cret"));
    }

    #[test]
    fn webhook_secret_absent_or_wrong_type() {
        assert_eq!(profile_with_settings(json!({})).webhook_secret(), None);
        assert_eq!(
            profile_with_settings(json!({"webhook_secret": 42})).webhook_secret(),
            None
        );
    }
}
