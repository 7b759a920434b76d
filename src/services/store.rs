//! Store data access layer.
//!
//! Every database operation the dispatch core performs lives here: claiming
//! pending work, recording channel outcomes, the unsubscribe lookups, and the
//! ingress write path. Handlers and workers never run ad-hoc SQL.
//!
//! # Failure Semantics
//!
//! All operations either succeed or return a categorised `AppError`.
//! Transient errors (connection loss) bubble up unchanged so the caller can
//! retry the outer unit of work; nothing is silently dropped.

use chrono::Utc;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::contact::Contact;
use crate::models::delivery::{DeliveryLog, DeliveryResult};
use crate::models::notification::{
    NewNotification, Notification, NotificationStatus,
};
use crate::models::profile::Profile;
use crate::models::template::Template;

/// Priority sort expression shared by the claim query.
///
/// Stored priorities are text; this maps them onto a drain order of
/// urgent > high > normal > low. Unknown values (impossible under the CHECK
/// constraint) sort last.
const PRIORITY_RANK_SQL: &str = "CASE priority \
     WHEN 'urgent' THEN 0 \
     WHEN 'high' THEN 1 \
     WHEN 'normal' THEN 2 \
     ELSE 3 END";

/// How long a `processing` row may sit untouched before it is redriven.
///
/// Long enough that jobs still queued or in flight from the original claim
/// have finished (every driver works under a 10-second timeout), so a
/// redrive never races its own first attempt.
const REDRIVE_AFTER_SECS: f64 = 300.0;

/// Claim up to `limit` due notifications, promoting them to `processing`.
///
/// Eligible rows are `pending` with `scheduled_at <= now()`, plus
/// `processing` rows that went stale: untouched for [`REDRIVE_AFTER_SECS`]
/// with requested channels still unattempted. The stale clause recovers
/// work stranded by a full queue, a failed contact load, or a crash
/// mid-dispatch; fan-out skips already-attempted channels, so a redriven
/// row never re-sends what it already delivered. Rows are taken in
/// priority order, ties broken by earlier `scheduled_at`.
///
/// # Concurrency
///
/// `FOR UPDATE SKIP LOCKED` inside the claiming UPDATE guarantees that a
/// notification is claimed by at most one poller even when several run
/// concurrently: competing transactions skip rows another claimer has locked
/// instead of blocking or double-claiming. The UPDATE also refreshes
/// `updated_at`, which restarts the staleness clock for the claimed rows.
///
/// The returned batch is re-sorted in memory because `RETURNING` does not
/// preserve the subquery's order.
pub async fn claim_pending_batch(
    pool: &DbPool,
    limit: i64,
) -> Result<Vec<Notification>, AppError> {
    let sql = format!(
        r#"
        UPDATE notifications
        SET status = 'processing', updated_at = NOW()
        WHERE id IN (
            SELECT id FROM notifications
            WHERE (status = 'pending' AND scheduled_at <= NOW())
               OR (status = 'processing'
                   AND updated_at < NOW() - make_interval(secs => $2)
                   AND NOT (channels_requested <@ channels_attempted))
            ORDER BY {PRIORITY_RANK_SQL}, scheduled_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING *
        "#
    );

    let mut claimed = sqlx::query_as::<_, Notification>(&sql)
        .bind(limit)
        .bind(REDRIVE_AFTER_SECS)
        .fetch_all(pool)
        .await?;

    claimed.sort_by_key(|n| (n.priority_rank(), n.scheduled_at));
    Ok(claimed)
}

/// Record one channel outcome: delivery log, progress, and terminal status.
///
/// Runs as a single transaction that:
///
/// 1. Inserts the delivery log row (so the log is durable before any
///    observer can see the channel in the attempted set).
/// 2. Appends the channel to `channels_attempted` iff it is not already
///    there (idempotent under re-records).
/// 3. If every requested channel has now been attempted, computes the
///    terminal status from the logs and writes it: `delivered` when no
///    failed log exists for the notification, `failed` otherwise — a mixed
///    outcome is reported as `failed` so operators notice partial delivery.
///
/// The UPDATE in step 2 takes the row lock, so two workers finishing the
/// last two channels simultaneously serialise here and exactly one of them
/// observes "all channels attempted" last and writes the terminal status.
///
/// Returns the terminal status when this outcome completed the notification.
pub async fn record_channel_outcome(
    pool: &DbPool,
    result: &DeliveryResult,
) -> Result<Option<NotificationStatus>, AppError> {
    let mut tx = pool.begin().await?;

    // Step 1: the log row, before any progress is visible
    sqlx::query(
        r#"
        INSERT INTO delivery_logs (notification_id, channel, success, error, delivered_at, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(result.notification_id)
    .bind(result.channel.as_str())
    .bind(result.success)
    .bind(&result.error)
    .bind(result.delivered_at)
    .bind(&result.metadata)
    .execute(&mut *tx)
    .await?;

    // Step 2: idempotent append; the UPDATE serialises concurrent finishers
    let (attempted, requested) = sqlx::query_as::<_, (Vec<String>, Vec<String>)>(
        r#"
        UPDATE notifications
        SET channels_attempted = CASE
                WHEN $2 = ANY(channels_attempted) THEN channels_attempted
                ELSE array_append(channels_attempted, $2)
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING channels_attempted, channels_requested
        "#,
    )
    .bind(result.notification_id)
    .bind(result.channel.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotificationNotFound)?;

    let all_attempted = requested.iter().all(|c| attempted.contains(c));
    if !all_attempted {
        tx.commit().await?;
        return Ok(None);
    }

    // Step 3: terminal status from the aggregate of this notification's logs
    let failed_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM delivery_logs WHERE notification_id = $1 AND success = FALSE",
    )
    .bind(result.notification_id)
    .fetch_one(&mut *tx)
    .await?;

    let terminal = terminal_status(failed_count);

    // Terminal transitions only apply to rows still in processing
    sqlx::query(
        "UPDATE notifications SET status = $2, updated_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(result.notification_id)
    .bind(terminal.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(terminal))
}

/// Terminal status from the count of failed delivery logs.
///
/// Any failed channel makes the whole notification `failed`, so a partial
/// delivery is operator-visible rather than masked as success.
pub(crate) fn terminal_status(failed_count: i64) -> NotificationStatus {
    if failed_count == 0 {
        NotificationStatus::Delivered
    } else {
        NotificationStatus::Failed
    }
}

/// Whether an active unsubscribe exists for `(contact_id, channel)`.
pub async fn is_channel_unsubscribed(
    pool: &DbPool,
    contact_id: Uuid,
    channel: crate::models::notification::Channel,
) -> Result<bool, AppError> {
    let blocked: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM unsubscribes
            WHERE contact_id = $1 AND channel = $2 AND active = TRUE
        )
        "#,
    )
    .bind(contact_id)
    .bind(channel.as_str())
    .fetch_one(pool)
    .await?;

    Ok(blocked)
}

/// Load a contact by id.
pub async fn load_contact(pool: &DbPool, contact_id: Uuid) -> Result<Contact, AppError> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
        .bind(contact_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::ContactNotFound)
}

/// Load a profile by id.
pub async fn load_profile(pool: &DbPool, profile_id: Uuid) -> Result<Profile, AppError> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::ProfileNotFound)
}

/// Authenticate an API key: locate by prefix, then verify the hash.
///
/// The prefix lookup keeps authentication an indexed O(1) probe; the hash
/// comparison happens against the located rows only. Suspended profiles
/// fail with a distinct error so callers can return 403 instead of 401.
pub async fn load_profile_by_api_key(
    pool: &DbPool,
    prefix: &str,
    key_hash: &str,
) -> Result<Profile, AppError> {
    let profile = sqlx::query_as::<_, Profile>(
        "SELECT * FROM profiles WHERE api_key_prefix = $1 AND api_key_hash = $2",
    )
    .bind(prefix)
    .bind(key_hash)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    if profile.status != "active" {
        return Err(AppError::ProfileSuspended);
    }

    Ok(profile)
}

/// Verify that `contact_id` belongs to `profile_id` (tenant isolation check).
pub async fn contact_belongs_to_profile(
    pool: &DbPool,
    contact_id: Uuid,
    profile_id: Uuid,
) -> Result<bool, AppError> {
    let owned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM contacts WHERE id = $1 AND profile_id = $2)",
    )
    .bind(contact_id)
    .bind(profile_id)
    .fetch_one(pool)
    .await?;

    Ok(owned)
}

/// Load a tenant's template by id.
pub async fn load_template(
    pool: &DbPool,
    profile_id: Uuid,
    template_id: Uuid,
) -> Result<Template, AppError> {
    sqlx::query_as::<_, Template>(
        "SELECT * FROM templates WHERE id = $1 AND profile_id = $2",
    )
    .bind(template_id)
    .bind(profile_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::TemplateNotFound)
}

/// Insert one pending notification; returns its id.
///
/// `scheduled_at` defaults to "now" when the caller did not supply one;
/// a future instant keeps the row invisible to the claim query until due.
pub async fn insert_notification(
    pool: &DbPool,
    new: &NewNotification,
) -> Result<Uuid, AppError> {
    let channels: Vec<String> = new
        .channels
        .iter()
        .map(|c| c.as_str().to_string())
        .collect();
    let scheduled_at = new.scheduled_at.unwrap_or_else(Utc::now);

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO notifications
            (profile_id, contact_id, subject, content, variables,
             channels_requested, priority, scheduled_at, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
        RETURNING id
        "#,
    )
    .bind(new.profile_id)
    .bind(new.contact_id)
    .bind(&new.subject)
    .bind(sqlx::types::Json(&new.content))
    .bind(&new.variables)
    .bind(&channels)
    .bind(new.priority.as_str())
    .bind(scheduled_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Load a tenant's notification by id.
pub async fn load_notification(
    pool: &DbPool,
    profile_id: Uuid,
    notification_id: Uuid,
) -> Result<Notification, AppError> {
    sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE id = $1 AND profile_id = $2",
    )
    .bind(notification_id)
    .bind(profile_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotificationNotFound)
}

/// Load all delivery logs for a notification, oldest first.
pub async fn load_delivery_logs(
    pool: &DbPool,
    notification_id: Uuid,
) -> Result<Vec<DeliveryLog>, AppError> {
    let logs = sqlx::query_as::<_, DeliveryLog>(
        "SELECT * FROM delivery_logs WHERE notification_id = $1 ORDER BY delivered_at ASC",
    )
    .bind(notification_id)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

/// Record an email unsubscribe arriving from the provider webhook.
///
/// Resolves the profile by slug and the contact by email identifier; when
/// either is unknown the request is ignored (the webhook always answers 200,
/// so there is nothing useful to surface to the provider). The insert is
/// idempotent against the partial unique index: an already-active
/// unsubscribe is left untouched.
///
/// Returns whether a suppression row now exists for the pair.
pub async fn record_unsubscribe(
    pool: &DbPool,
    profile_slug: &str,
    email: &str,
    reason: Option<&str>,
) -> Result<bool, AppError> {
    let profile_id: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM profiles WHERE slug = $1")
            .bind(profile_slug)
            .fetch_optional(pool)
            .await?;
    let Some(profile_id) = profile_id else {
        tracing::warn!(profile_slug, "Unsubscribe for unknown profile, ignored");
        return Ok(false);
    };

    let contact_id: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM contacts WHERE profile_id = $1 AND identifier = $2",
    )
    .bind(profile_id)
    .bind(email)
    .fetch_optional(pool)
    .await?;
    let Some(contact_id) = contact_id else {
        tracing::warn!(profile_slug, email, "Unsubscribe for unknown contact, ignored");
        return Ok(false);
    };

    sqlx::query(
        r#"
        INSERT INTO unsubscribes (profile_id, contact_id, channel, reason, active)
        VALUES ($1, $2, 'email', $3, TRUE)
        ON CONFLICT (contact_id, channel) WHERE active DO NOTHING
        "#,
    )
    .bind(profile_id)
    .bind(contact_id)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_successes_is_delivered() {
        assert_eq!(terminal_status(0), NotificationStatus::Delivered);
    }

    #[test]
    fn mixed_outcome_is_failed() {
        // One failed channel among successes still fails the notification
        assert_eq!(terminal_status(1), NotificationStatus::Failed);
    }

    #[test]
    fn all_failures_is_failed() {
        assert_eq!(terminal_status(4), NotificationStatus::Failed);
    }
}
