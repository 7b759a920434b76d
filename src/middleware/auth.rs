//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the `X-API-Key` or `Authorization: Bearer` header
//! 2. Locate the profile by key prefix, then verify the SHA-256 hash
//! 3. Inject the tenant context into the request
//! 4. Reject unauthorized requests with HTTP 401 (403 for suspended tenants)

use crate::{db::DbPool, error::AppError, services::store};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Characters of the plaintext key stored as the indexed lookup prefix.
pub const API_KEY_PREFIX_LEN: usize = 8;

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know which tenant made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated profile
    ///
    /// Used to filter database queries (tenant isolation)
    pub profile_id: Uuid,

    /// Tenant slug, matched against the `{tenant}` path segment
    pub slug: String,
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract the key from `X-API-Key: <key>` or `Authorization: Bearer <key>`
/// 2. Derive the key prefix (first 8 characters) and SHA-256 hash
/// 3. Query for a profile matching both; verify it is active
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized (403 if the profile is suspended)
///
/// # Headers
///
/// Either of:
/// ```text
/// X-API-Key: nk_abc123...
/// Authorization: Bearer nk_abc123...
/// ```
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Step 1: extract the plaintext key from either supported header
    let api_key = extract_api_key(&request).ok_or(AppError::InvalidApiKey)?;

    // Step 2: prefix for the indexed lookup, hash for verification
    let prefix = key_prefix(&api_key).ok_or(AppError::InvalidApiKey)?;
    let key_hash = hash_api_key(&api_key);

    // Step 3: locate and verify
    let profile = store::load_profile_by_api_key(&pool, prefix, &key_hash).await?;

    // Step 4: inject context into request extensions
    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(AuthContext {
        profile_id: profile.id,
        slug: profile.slug,
    });

    Ok(next.run(request).await)
}

/// Pull the plaintext API key from `X-API-Key` or `Authorization: Bearer`.
fn extract_api_key(request: &Request) -> Option<String> {
    if let Some(key) = request
        .headers()
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
    {
        return Some(key.to_string());
    }

    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|key| key.to_string())
}

/// First characters of the key, used for the indexed profile lookup.
///
/// Keys shorter than the prefix length cannot match any stored profile.
pub fn key_prefix(api_key: &str) -> Option<&str> {
    if api_key.len() < API_KEY_PREFIX_LEN || !api_key.is_char_boundary(API_KEY_PREFIX_LEN) {
        return None;
    }
    Some(&api_key[..API_KEY_PREFIX_LEN])
}

/// SHA-256 hash of the plaintext key, hex-encoded (64 characters).
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_hex() {
        let first = hash_api_key("nk_test_key_123");
        let second = hash_api_key("nk_test_key_123");

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, hash_api_key("nk_test_key_124"));
    }

    #[test]
    fn prefix_takes_first_eight_chars() {
        assert_eq!(key_prefix("nk_abc123xyz"), Some("nk_abc12"));
    }

    #[test]
    fn short_keys_have_no_prefix() {
        assert_eq!(key_prefix("short"), None);
        assert_eq!(key_prefix(""), None);
    }
}
