//! Session-scoped thread and message operations.
//!
//! Every function resolves the owner from the session first, so an
//! anonymous caller gets [`RagError::Unauthorized`] before any query runs.

use database::{message, thread, ChatMessage, ChatThread, Database, NewMessage, NewThread};
use rag_core::{ChatRole, HistoryMessage, UserSession};
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// Create a thread owned by the caller.
pub async fn create_thread(
    db: &Database,
    session: &UserSession,
    name: &str,
    persona: Option<(&str, &str)>,
) -> Result<ChatThread> {
    let owner = session.owner_id()?;
    let mut new_thread = NewThread::new(owner, name);
    if let Some((title, message)) = persona {
        new_thread = new_thread.with_persona(title, message);
    }
    let created = thread::create_thread(db.pool(), &new_thread).await?;
    debug!(thread = %created.id, "Created thread");
    Ok(created)
}

/// Load one of the caller's threads.
pub async fn load_thread(db: &Database, session: &UserSession, id: &str) -> Result<ChatThread> {
    let owner = session.owner_id()?;
    Ok(thread::get_thread(db.pool(), owner, id).await?)
}

/// List the caller's threads, most recently active first.
pub async fn list_threads(db: &Database, session: &UserSession) -> Result<Vec<ChatThread>> {
    let owner = session.owner_id()?;
    Ok(thread::list_threads(db.pool(), owner).await?)
}

/// Soft-delete one of the caller's threads and its messages.
pub async fn delete_thread(db: &Database, session: &UserSession, id: &str) -> Result<()> {
    let owner = session.owner_id()?;
    Ok(thread::soft_delete_thread(db.pool(), owner, id).await?)
}

/// Append a message to a thread and bump its activity time.
pub async fn create_message(
    db: &Database,
    session: &UserSession,
    thread_id: &str,
    role: ChatRole,
    content: &str,
) -> Result<ChatMessage> {
    let owner = session.owner_id()?;
    let new_message = NewMessage {
        chat_thread_id: thread_id.to_string(),
        user_id: owner.to_string(),
        role: role.as_str().to_string(),
        content: content.to_string(),
        multi_modal_image: None,
    };
    let created = message::create_message(db.pool(), &new_message).await?;
    thread::touch_thread(db.pool(), owner, thread_id).await?;
    Ok(created)
}

/// The thread's messages as model history, oldest first.
///
/// Rows with an unrecognized role are skipped.
pub async fn load_history(
    db: &Database,
    session: &UserSession,
    thread_id: &str,
) -> Result<Vec<HistoryMessage>> {
    let owner = session.owner_id()?;
    let rows = message::list_messages(db.pool(), owner, thread_id).await?;
    Ok(to_history(rows))
}

fn to_history(rows: Vec<ChatMessage>) -> Vec<HistoryMessage> {
    rows.into_iter()
        .filter_map(|row| match row.role.parse::<ChatRole>() {
            Ok(role) => Some(HistoryMessage::new(role, row.content)),
            Err(e) => {
                warn!(message = %row.id, "Skipping message: {}", e);
                None
            }
        })
        .collect()
}

/// Whether `err` means the thread does not exist for this caller.
pub fn is_missing_thread(err: &RagError) -> bool {
    matches!(err, RagError::NotFound { entity: "ChatThread", .. })
}
