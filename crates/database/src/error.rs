//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// Value rejected before reaching the database.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl DatabaseError {
    /// Whether this error means the requested row does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
