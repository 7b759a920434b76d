//! Notification HTTP handlers.
//!
//! This module implements the tenant-facing notification endpoints:
//! - POST /api/v1/{tenant}/notifications/send - Queue notifications for dispatch
//! - GET /api/v1/{tenant}/notifications/{id} - Notification status + delivery logs
//!
//! The send path is intentionally thin: it authenticates, validates, resolves
//! the optional template, and inserts `pending` rows. All delivery work
//! happens asynchronously in the dispatch engine, which discovers new rows
//! through its polling loop.

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::notification::{
        MessageContent, NewNotification, Notification, SendRequest, SendResponse,
    },
    services::store,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Queue notifications for every recipient in the request.
///
/// # Request Body
///
/// ```json
/// {
///   "recipients": [
///     { "contact_id": "550e8400-...", "variables": { "name": "Ada" } }
///   ],
///   "subject": "Hi {{name}}",
///   "content": { "text": "Hello {{name}}" },
///   "channels": ["email"],
///   "priority": "normal",
///   "scheduled_at": "2025-06-01T09:00:00Z"
/// }
/// ```
///
/// # Response (201 Created)
///
/// ```json
/// { "notifications": ["770e8400-..."] }
/// ```
///
/// # Validation
///
/// - `channels` must be non-empty (unknown channel names already fail
///   deserialization with a 4xx)
/// - either inline `content` or a `template_id` must provide a payload
/// - every recipient's contact must belong to the authenticated tenant
///
/// Unsubscribe state is deliberately NOT checked here: the policy gate runs
/// at dispatch time so that late unsubscribes are honoured.
pub async fn send_notifications(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(tenant): Path<String>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<SendResponse>), AppError> {
    // The path slug must name the authenticated tenant
    if tenant != auth.slug {
        return Err(AppError::ProfileNotFound);
    }

    if request.channels.is_empty() {
        return Err(AppError::InvalidRequest(
            "channels must not be empty".to_string(),
        ));
    }
    if request.recipients.is_empty() {
        return Err(AppError::InvalidRequest(
            "recipients must not be empty".to_string(),
        ));
    }

    // Resolve the optional template; inline fields take precedence
    let (subject, content) = resolve_message(&pool, auth.profile_id, &request).await?;

    if content.is_empty() {
        return Err(AppError::InvalidRequest(
            "content or template_id is required".to_string(),
        ));
    }

    // One pending notification per recipient
    let mut created = Vec::with_capacity(request.recipients.len());
    for recipient in &request.recipients {
        if !store::contact_belongs_to_profile(&pool, recipient.contact_id, auth.profile_id).await? {
            return Err(AppError::ContactNotFound);
        }

        let id = store::insert_notification(
            &pool,
            &NewNotification {
                profile_id: auth.profile_id,
                contact_id: recipient.contact_id,
                subject: subject.clone(),
                content: content.clone(),
                variables: recipient
                    .variables
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({})),
                channels: request.channels.clone(),
                priority: request.priority,
                scheduled_at: request.scheduled_at,
            },
        )
        .await?;
        created.push(id);
    }

    tracing::info!(
        profile_id = %auth.profile_id,
        count = created.len(),
        "Notifications queued"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendResponse {
            notifications: created,
        }),
    ))
}

/// Merge inline subject/content with the optional template's.
async fn resolve_message(
    pool: &DbPool,
    profile_id: Uuid,
    request: &SendRequest,
) -> Result<(String, MessageContent), AppError> {
    let template = match request.template_id {
        Some(template_id) => Some(store::load_template(pool, profile_id, template_id).await?),
        None => None,
    };

    let subject = request
        .subject
        .clone()
        .or_else(|| template.as_ref().and_then(|t| t.subject.clone()))
        .unwrap_or_default();

    let content = request
        .content
        .clone()
        .or_else(|| template.as_ref().map(|t| t.content.0.clone()))
        .unwrap_or_default();

    Ok((subject, content))
}

/// Per-channel delivery detail in the status response.
#[derive(Debug, Serialize)]
pub struct DeliveryLogResponse {
    pub channel: String,
    pub success: bool,
    pub error: String,
    pub delivered_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// Response body for the notification status endpoint.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub subject: String,
    pub channels_requested: Vec<String>,
    pub channels_attempted: Vec<String>,
    pub priority: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deliveries: Vec<DeliveryLogResponse>,
}

/// Read a notification's status and its per-channel delivery logs.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "id": "770e8400-...",
///   "contact_id": "550e8400-...",
///   "subject": "Hi {{name}}",
///   "channels_requested": ["email", "webhook"],
///   "channels_attempted": ["email"],
///   "priority": "normal",
///   "scheduled_at": "2025-06-01T09:00:00Z",
///   "status": "processing",
///   "deliveries": [
///     { "channel": "email", "success": true, "error": "",
///       "delivered_at": "2025-06-01T09:00:02Z",
///       "metadata": { "simulated": true, "to": "c@x.test" } }
///   ]
/// }
/// ```
///
/// # Security
///
/// Returns 404 if the notification doesn't exist OR belongs to a different
/// tenant (prevents leaking existence across tenants).
pub async fn get_notification(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path((tenant, notification_id)): Path<(String, Uuid)>,
) -> Result<Json<NotificationResponse>, AppError> {
    if tenant != auth.slug {
        return Err(AppError::ProfileNotFound);
    }

    let notification = store::load_notification(&pool, auth.profile_id, notification_id).await?;
    let logs = store::load_delivery_logs(&pool, notification.id).await?;

    Ok(Json(to_response(notification, logs)))
}

fn to_response(
    notification: Notification,
    logs: Vec<crate::models::delivery::DeliveryLog>,
) -> NotificationResponse {
    NotificationResponse {
        id: notification.id,
        contact_id: notification.contact_id,
        subject: notification.subject,
        channels_requested: notification.channels_requested,
        channels_attempted: notification.channels_attempted,
        priority: notification.priority,
        scheduled_at: notification.scheduled_at,
        status: notification.status,
        created_at: notification.created_at,
        updated_at: notification.updated_at,
        deliveries: logs
            .into_iter()
            .map(|log| DeliveryLogResponse {
                channel: log.channel,
                success: log.success,
                error: log.error,
                delivered_at: log.delivered_at,
                metadata: log.metadata,
            })
            .collect(),
    }
}
