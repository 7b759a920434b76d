//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Infrastructure Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys, suspended tenants
/// - **Resource Errors**: Requested resources not found or not owned by the tenant
/// - **Validation Errors**: Invalid request data (empty channel list, missing content)
///
/// Transport failures and policy-suppressed deliveries are deliberately NOT
/// represented here: they are recorded as failed delivery results per channel
/// and never surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, unknown, or does not verify against the stored hash.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The authenticated profile exists but is suspended.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Profile is suspended")]
    ProfileSuspended,

    /// Tenant slug in the URL does not match the authenticated profile.
    ///
    /// Returns HTTP 404 Not Found (avoids leaking tenant existence).
    #[error("Profile not found")]
    ProfileNotFound,

    /// Referenced contact does not exist or belongs to a different tenant.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Contact not found")]
    ContactNotFound,

    /// Referenced template does not exist or belongs to a different tenant.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Template not found")]
    TemplateNotFound,

    /// Requested notification does not exist or belongs to a different tenant.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Notification not found")]
    NotificationNotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidApiKey` → 401 Unauthorized
/// - `ProfileSuspended` → 403 Forbidden
/// - `ProfileNotFound` / `ContactNotFound` / `TemplateNotFound` /
///   `NotificationNotFound` → 404 Not Found
/// - `InvalidRequest` → 400 Bad Request
/// - `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::ProfileSuspended => (
                StatusCode::FORBIDDEN,
                "profile_suspended",
                self.to_string(),
            ),
            AppError::ProfileNotFound => {
                (StatusCode::NOT_FOUND, "profile_not_found", self.to_string())
            }
            AppError::ContactNotFound => {
                (StatusCode::NOT_FOUND, "contact_not_found", self.to_string())
            }
            AppError::TemplateNotFound => (
                StatusCode::NOT_FOUND,
                "template_not_found",
                self.to_string(),
            ),
            AppError::NotificationNotFound => (
                StatusCode::NOT_FOUND,
                "notification_not_found",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // Return the response with status code and JSON body
        (status, body).into_response()
    }
}
