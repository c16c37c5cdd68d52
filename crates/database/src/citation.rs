//! Citation persistence.

use serde_json::Value;
use sqlx::PgPool;

use crate::error::{DatabaseError, Result};
use crate::models::{CitationRecord, CHAT_CITATION};

/// Store a citation for `user_id`.
pub async fn create_citation(
    pool: &PgPool,
    user_id: &str,
    content: &Value,
) -> Result<CitationRecord> {
    let citation = sqlx::query_as::<_, CitationRecord>(
        r#"
        INSERT INTO chat_citations (id, content, user_id, type)
        VALUES ($1, $2, $3, $4)
        RETURNING id, content, user_id, created_at
        "#,
    )
    .bind(crate::new_id())
    .bind(content)
    .bind(user_id)
    .bind(CHAT_CITATION)
    .fetch_one(pool)
    .await?;

    Ok(citation)
}

/// Look up one of `user_id`'s citations.
///
/// A missing row is [`DatabaseError::NotFound`]; query failures stay
/// [`DatabaseError::Sqlx`].
pub async fn find_citation(pool: &PgPool, user_id: &str, id: &str) -> Result<CitationRecord> {
    sqlx::query_as::<_, CitationRecord>(
        r#"
        SELECT id, content, user_id, created_at
        FROM chat_citations
        WHERE id = $1 AND user_id = $2 AND type = $3
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(CHAT_CITATION)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Citation",
        id: id.to_string(),
    })
}
