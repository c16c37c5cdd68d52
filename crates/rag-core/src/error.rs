//! Error types for model and session operations.

use thiserror::Error;

/// Errors that can occur while resolving a caller or talking to a model.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The caller's owner identity is missing or blank.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport failure while reaching a provider.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The provider stream broke or sent something unparseable.
    #[error("stream error: {0}")]
    Stream(String),

    /// Similarity search failed.
    #[error("search failed: {0}")]
    Search(String),

    /// The request was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,
}

impl ChatError {
    /// Whether this error is an authorization failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ChatError::Unauthorized(_))
    }
}
