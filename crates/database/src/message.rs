//! Chat message persistence.

use sqlx::PgPool;

use crate::error::{DatabaseError, Result};
use crate::models::{ChatMessage, NewMessage, CHAT_MESSAGE};

/// Insert a message.
pub async fn create_message(pool: &PgPool, message: &NewMessage) -> Result<ChatMessage> {
    let message = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO chat_messages
            (id, chat_thread_id, user_id, role, content, multi_modal_image, type)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, chat_thread_id, user_id, role, content, multi_modal_image,
            is_deleted, created_at
        "#,
    )
    .bind(crate::new_id())
    .bind(&message.chat_thread_id)
    .bind(&message.user_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(&message.multi_modal_image)
    .bind(CHAT_MESSAGE)
    .fetch_one(pool)
    .await?;

    Ok(message)
}

/// List the live messages of a thread, oldest first.
pub async fn list_messages(
    pool: &PgPool,
    user_id: &str,
    chat_thread_id: &str,
) -> Result<Vec<ChatMessage>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, chat_thread_id, user_id, role, content, multi_modal_image, is_deleted, created_at
        FROM chat_messages
        WHERE chat_thread_id = $1 AND user_id = $2 AND type = $3 AND is_deleted = FALSE
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(chat_thread_id)
    .bind(user_id)
    .bind(CHAT_MESSAGE)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Soft-delete a single message.
pub async fn soft_delete_message(pool: &PgPool, user_id: &str, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chat_messages
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
            entity: "ChatMessage",
            id: id.to_string(),
        });
    }

    Ok(())
}
