//! Error types for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rag::RagError;
use rag_core::ChatError;
use tenant::TenantError;
use thiserror::Error;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An upstream service (model or provisioning provider) failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            RagError::Forbidden(msg) => ApiError::Forbidden(msg),
            RagError::NotFound { entity, id } => ApiError::NotFound(format!("{} {}", entity, id)),
            RagError::Chat(err) => err.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            ChatError::Provider { .. } | ChatError::Network(_) | ChatError::Stream(_) => {
                ApiError::Upstream(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TenantError> for ApiError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            TenantError::Provider { .. } | TenantError::Http(_) => {
                ApiError::Upstream(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
