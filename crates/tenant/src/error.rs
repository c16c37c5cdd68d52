//! Error types for tenant provisioning.

use database::DatabaseError;
use rag_core::ChatError;
use thiserror::Error;

/// Errors that can occur while provisioning or connecting to a tenant.
#[derive(Debug, Error)]
pub enum TenantError {
    /// HTTP transport error talking to the provider.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The provider answered with a body we could not use.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Schema bootstrap or pool creation failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller's identity could not be resolved.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl From<ChatError> for TenantError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Unauthorized(msg) => TenantError::Unauthorized(msg),
            ChatError::Configuration(msg) => TenantError::Configuration(msg),
            other => TenantError::InvalidResponse(other.to_string()),
        }
    }
}

/// Result type for tenant operations.
pub type Result<T> = std::result::Result<T, TenantError>;
