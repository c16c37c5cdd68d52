//! Error types for chat turns.

use database::DatabaseError;
use rag_core::ChatError;
use thiserror::Error;

/// Errors surfaced by retrieval-augmented operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller's owner identity is missing or blank.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is known but may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested entity does not exist for this owner.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Any other storage failure.
    #[error("database error: {0}")]
    Database(DatabaseError),

    /// Model or stream failure.
    #[error(transparent)]
    Chat(ChatError),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RagError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RagError::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RagError::NotFound { .. })
    }
}

impl From<DatabaseError> for RagError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => RagError::NotFound { entity, id },
            other => RagError::Database(other),
        }
    }
}

impl From<ChatError> for RagError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Unauthorized(msg) => RagError::Unauthorized(msg),
            other => RagError::Chat(other),
        }
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Database(DatabaseError::Serialization(err))
    }
}

/// Result type for chat-turn operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_split_from_other_failures() {
        let err: RagError = DatabaseError::NotFound {
            entity: "Citation",
            id: "c1".to_string(),
        }
        .into();
        assert!(err.is_not_found());

        let err: RagError = DatabaseError::InvalidData("bad row".to_string()).into();
        assert!(matches!(err, RagError::Database(_)));
    }

    #[test]
    fn test_unauthorized_is_lifted() {
        let err: RagError = ChatError::Unauthorized("no user".to_string()).into();
        assert!(err.is_unauthorized());

        let err: RagError = ChatError::Cancelled.into();
        assert!(matches!(err, RagError::Chat(ChatError::Cancelled)));
    }
}
