//! Request authentication.
//!
//! The upstream auth collaborator resolves the caller and forwards the hashed
//! user id and admin flag as headers. This service only checks the optional
//! shared bearer token.

use axum::http::{header, HeaderMap};
use rag_core::UserSession;

use crate::error::ApiError;

/// Header carrying the hashed user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the admin flag.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// Check the shared bearer token, if one is configured.
pub fn authorize(api_token: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = api_token else {
        return Ok(());
    };

    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(ApiError::Unauthorized("missing bearer token".to_string()));
    };

    let Ok(value) = value.to_str() else {
        return Err(ApiError::Unauthorized("malformed authorization header".to_string()));
    };

    let token = value.strip_prefix("Bearer ").unwrap_or(value);
    if token != expected {
        return Err(ApiError::Unauthorized("invalid bearer token".to_string()));
    }

    Ok(())
}

/// Build the caller's session from identity headers.
///
/// A missing or blank user id yields a session whose owner cannot be
/// resolved; owner-scoped operations reject it.
pub fn session_from_headers(headers: &HeaderMap) -> UserSession {
    let user_hash = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let is_admin = headers
        .get(USER_ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    UserSession {
        user_hash,
        is_admin,
    }
}
