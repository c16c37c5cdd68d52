//! Chat thread CRUD operations.
//!
//! Every query is scoped to the owning user id.

use sqlx::PgPool;

use crate::error::{DatabaseError, Result};
use crate::models::{ChatThread, NewThread, CHAT_THREAD};

/// Create a new thread.
pub async fn create_thread(pool: &PgPool, thread: &NewThread) -> Result<ChatThread> {
    let id = crate::new_id();

    sqlx::query_as::<_, ChatThread>(
        r#"
        INSERT INTO chat_threads (id, name, user_id, persona_message, persona_message_title, type)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, name, user_id, persona_message, persona_message_title,
                  is_deleted, created_at, last_message_at
        "#,
    )
    .bind(&id)
    .bind(&thread.name)
    .bind(&thread.user_id)
    .bind(&thread.persona_message)
    .bind(&thread.persona_message_title)
    .bind(CHAT_THREAD)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "ChatThread",
                    id: id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })
}

/// Get a live (not soft-deleted) thread by ID.
pub async fn get_thread(pool: &PgPool, user_id: &str, id: &str) -> Result<ChatThread> {
    sqlx::query_as::<_, ChatThread>(
        r#"
        SELECT id, name, user_id, persona_message, persona_message_title,
               is_deleted, created_at, last_message_at
        FROM chat_threads
        WHERE id = $1 AND user_id = $2 AND type = $3 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(CHAT_THREAD)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "ChatThread",
        id: id.to_string(),
    })
}

/// List a user's live threads, most recently active first.
pub async fn list_threads(pool: &PgPool, user_id: &str) -> Result<Vec<ChatThread>> {
    let threads = sqlx::query_as::<_, ChatThread>(
        r#"
        SELECT id, name, user_id, persona_message, persona_message_title,
               is_deleted, created_at, last_message_at
        FROM chat_threads
        WHERE user_id = $1 AND type = $2 AND is_deleted = FALSE
        ORDER BY last_message_at DESC
        "#,
    )
    .bind(user_id)
    .bind(CHAT_THREAD)
    .fetch_all(pool)
    .await?;

    Ok(threads)
}

/// Mark a thread as active now.
pub async fn touch_thread(pool: &PgPool, user_id: &str, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chat_threads
        SET last_message_at = now()
        WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ChatThread",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Soft-delete a thread together with its messages and attached documents.
///
/// The three updates are independent statements.
pub async fn soft_delete_thread(pool: &PgPool, user_id: &str, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chat_threads
        SET is_deleted = TRUE
        WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ChatThread",
            id: id.to_string(),
        });
    }

    sqlx::query(
        r#"
        UPDATE chat_messages
        SET is_deleted = TRUE
        WHERE chat_thread_id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        UPDATE chat_documents
        SET is_deleted = TRUE
        WHERE chat_thread_id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}
