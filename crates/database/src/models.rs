//! Database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Type discriminator stored on chat thread rows.
pub const CHAT_THREAD: &str = "CHAT_THREAD";
/// Type discriminator stored on chat message rows.
pub const CHAT_MESSAGE: &str = "CHAT_MESSAGE";
/// Type discriminator stored on citation rows.
pub const CHAT_CITATION: &str = "CHAT_CITATION";

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatThread {
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owner (hashed user id).
    pub user_id: String,
    /// System message sent at the start of every completion.
    pub persona_message: String,
    /// Title of the persona the message came from.
    pub persona_message_title: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    /// Updated on every turn.
    pub last_message_at: DateTime<Utc>,
}

/// Values for a thread about to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewThread {
    pub user_id: String,
    pub name: String,
    pub persona_message: String,
    pub persona_message_title: String,
}

impl NewThread {
    /// A thread with no persona.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attach a persona to the thread.
    pub fn with_persona(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.persona_message_title = title.into();
        self.persona_message = message.into();
        self
    }
}

/// One utterance in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: String,
    pub chat_thread_id: String,
    pub user_id: String,
    /// "user", "assistant", "tool", "function" or "system".
    pub role: String,
    pub content: String,
    /// Optional base64 data URL of an attached image.
    pub multi_modal_image: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Values for a message about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_thread_id: String,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub multi_modal_image: Option<String>,
}

/// A persisted citation.
///
/// `content` holds the redacted search result (score plus document fields)
/// as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CitationRecord {
    pub id: String,
    pub content: Value,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A document chunk to index.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub page_content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
    pub user_id: String,
    /// Owning thread. `None` for admin knowledge-base chunks.
    pub chat_thread_id: Option<String>,
    pub is_admin_kb: bool,
}

/// A document chunk returned by a vector search, with its cosine similarity.
///
/// The embedding column is never selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ScoredDocument {
    pub id: String,
    pub page_content: String,
    pub metadata: Value,
    pub chat_thread_id: Option<String>,
    pub user_id: String,
    pub is_admin_kb: bool,
    /// `1 - cosine distance`; higher is more similar.
    pub score: f64,
}
