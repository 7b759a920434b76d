//! Provider-facing webhook handlers.
//!
//! This module implements the single inbound webhook the core exposes:
//! the unsubscribe callback posted by email providers. It is the only path
//! that writes the unsubscribes table; dispatch reads it through the policy
//! gate at delivery time.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::services::store;

/// Unsubscribe callback body.
///
/// # Example
///
/// ```json
/// {
///   "email": "c@x.test",
///   "reason": "user clicked unsubscribe",
///   "profile": "acme"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub email: String,

    pub reason: Option<String>,

    /// Tenant slug the unsubscribe applies to
    pub profile: String,
}

/// Response body; always `{"status": "ok"}`.
#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub status: String,
}

/// Record an email unsubscribe.
///
/// # Contract
///
/// Always returns 200, even for unknown profiles or contacts and even on
/// database errors: providers retry aggressively on non-2xx and there is
/// nothing useful they can do with our failure. Problems are logged for
/// operators instead.
///
/// An unsubscribe recorded here wins over any already-scheduled
/// notification, because the policy gate re-checks at dispatch time.
pub async fn unsubscribe(
    State(pool): State<DbPool>,
    Json(request): Json<UnsubscribeRequest>,
) -> Json<UnsubscribeResponse> {
    match store::record_unsubscribe(
        &pool,
        &request.profile,
        &request.email,
        request.reason.as_deref(),
    )
    .await
    {
        Ok(true) => {
            tracing::info!(
                profile = %request.profile,
                "Unsubscribe recorded"
            );
        }
        Ok(false) => {
            // Unknown profile or contact; already logged at warn in the store
        }
        Err(e) => {
            tracing::error!("Failed to record unsubscribe: {}", e);
        }
    }

    Json(UnsubscribeResponse {
        status: "ok".to_string(),
    })
}
