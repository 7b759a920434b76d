//! Template model - optional reusable message content.
//!
//! A send request may name a template instead of (or in addition to) inline
//! content; the ingress path resolves it into the notification's subject and
//! content at insert time. Templates are owned by admin flows; the core only
//! reads them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::notification::MessageContent;

/// Represents a template record from the database.
///
/// # Database Table
///
/// Maps to the `templates` table. `(profile_id, slug)` is unique per tenant.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Template {
    pub id: Uuid,

    /// Owning tenant
    pub profile_id: Uuid,

    pub slug: String,

    /// Channels this template was authored for (informational)
    pub channels: Vec<String>,

    pub category: Option<String>,

    pub subject: Option<String>,

    /// Per-format payloads with `{{key}}` tokens left unexpanded
    pub content: sqlx::types::Json<MessageContent>,

    pub status: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}
