//! Health endpoint.
//!
//! Unauthenticated probe for load balancers and uptime monitors. Answering
//! at all proves the HTTP layer is up; the body additionally reports
//! database reachability and the dispatch backlog, so a stalled dispatch
//! engine shows up as a growing `pending` count even while the probe stays
//! green.

use crate::{db::DbPool, error::AppError};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health probe response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,

    /// Database connectivity
    pub database: String,

    /// Notifications waiting to be claimed by the dispatch engine
    pub pending_notifications: i64,

    pub timestamp: DateTime<Utc>,
}

/// Report service health.
///
/// One query covers both signals: it fails fast when the database is
/// unreachable (surfacing as a 500 through the standard error body) and
/// otherwise returns the count of `pending` notifications as a coarse
/// backlog gauge.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "pending_notifications": 12,
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
pub async fn health_check(State(pool): State<DbPool>) -> Result<Json<HealthResponse>, AppError> {
    let pending: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE status = 'pending'")
            .fetch_one(&pool)
            .await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        database: "connected".to_string(),
        pending_notifications: pending,
        timestamp: Utc::now(),
    }))
}
