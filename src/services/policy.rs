//! Unsubscribe policy gate.
//!
//! The gate is consulted immediately before every dispatch attempt, never at
//! ingress time: an unsubscribe that arrives between scheduling and claim
//! must still be honoured, so callers must not cache the decision.
//!
//! A blocked channel short-circuits before the transport driver is invoked.
//! The worker still records a failed delivery log with [`UNSUBSCRIBED_ERROR`]
//! so the channel counts toward the notification's progress; suppressed
//! deliveries are never retried.

use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::notification::Channel;
use crate::services::store;

/// Error message recorded when a delivery is suppressed by an unsubscribe.
pub const UNSUBSCRIBED_ERROR: &str = "Contact unsubscribed from channel";

/// Whether dispatch on `channel` is allowed for `contact_id`.
///
/// Returns `false` iff an active unsubscribe row exists for the pair.
/// Store errors propagate: the caller treats them as infrastructure failures
/// and leaves the notification in `processing`, rather than recording a
/// delivery outcome it cannot trust.
pub async fn allowed(
    pool: &DbPool,
    contact_id: Uuid,
    channel: Channel,
) -> Result<bool, AppError> {
    let blocked = store::is_channel_unsubscribed(pool, contact_id, channel).await?;
    Ok(!blocked)
}
