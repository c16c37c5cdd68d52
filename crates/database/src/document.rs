//! Indexed document chunks and vector similarity search.
//!
//! Embeddings are sent as pgvector text literals (`[0.1,0.2,...]`) and cast
//! with `::vector`, so no client-side vector type is needed. Searches never
//! select the embedding column.

use std::fmt::Write;

use sqlx::PgPool;

use crate::error::{DatabaseError, Result};
use crate::models::{NewDocument, ScoredDocument};
use crate::schema::EMBEDDING_DIMENSIONS;

/// Insert a document chunk and return its id.
pub async fn insert_document(pool: &PgPool, document: &NewDocument) -> Result<String> {
    let embedding = vector_literal(&document.embedding)?;
    let id = crate::new_id();

    sqlx::query(
        r#"
        INSERT INTO documents
            (id, page_content, metadata, embedding, user_id, chat_thread_id, is_admin_kb)
        VALUES ($1, $2, $3, $4::vector, $5, $6, $7)
        "#,
    )
    .bind(&id)
    .bind(&document.page_content)
    .bind(&document.metadata)
    .bind(embedding)
    .bind(&document.user_id)
    .bind(&document.chat_thread_id)
    .bind(document.is_admin_kb)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Nearest admin knowledge-base chunks to `embedding`.
pub async fn search_admin_documents(
    pool: &PgPool,
    embedding: &[f32],
    limit: i64,
) -> Result<Vec<ScoredDocument>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let embedding = vector_literal(embedding)?;

    let documents = sqlx::query_as::<_, ScoredDocument>(
        r#"
        SELECT id, page_content, metadata, chat_thread_id, user_id, is_admin_kb,
               1 - (embedding <=> $1::vector) AS score
        FROM documents
        WHERE is_admin_kb = TRUE
        ORDER BY embedding <=> $1::vector
        LIMIT $2
        "#,
    )
    .bind(embedding)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(documents)
}

/// Nearest chunks uploaded by `user_id` into `chat_thread_id`.
pub async fn search_user_documents(
    pool: &PgPool,
    embedding: &[f32],
    user_id: &str,
    chat_thread_id: &str,
    limit: i64,
) -> Result<Vec<ScoredDocument>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let embedding = vector_literal(embedding)?;

    let documents = sqlx::query_as::<_, ScoredDocument>(
        r#"
        SELECT id, page_content, metadata, chat_thread_id, user_id, is_admin_kb,
               1 - (embedding <=> $1::vector) AS score
        FROM documents
        WHERE is_admin_kb = FALSE AND user_id = $2 AND chat_thread_id = $3
        ORDER BY embedding <=> $1::vector
        LIMIT $4
        "#,
    )
    .bind(embedding)
    .bind(user_id)
    .bind(chat_thread_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(documents)
}

/// Count the chunks indexed for a thread.
pub async fn count_thread_documents(
    pool: &PgPool,
    user_id: &str,
    chat_thread_id: &str,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM documents
        WHERE user_id = $1 AND chat_thread_id = $2
        "#,
    )
    .bind(user_id)
    .bind(chat_thread_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Render an embedding as a pgvector literal.
///
/// Rejects vectors whose length does not match the column, and non-finite
/// components.
pub fn vector_literal(embedding: &[f32]) -> Result<String> {
    if embedding.len() != EMBEDDING_DIMENSIONS {
        return Err(DatabaseError::InvalidData(format!(
            "embedding has {} dimensions, expected {}",
            embedding.len(),
            EMBEDDING_DIMENSIONS
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(DatabaseError::InvalidData(
            "embedding contains non-finite values".to_string(),
        ));
    }

    let mut literal = String::with_capacity(embedding.len() * 10 + 2);
    literal.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        let _ = write!(literal, "{}", value);
    }
    literal.push(']');
    Ok(literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vector(hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIMENSIONS];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_vector_literal_format() {
        let mut v = unit_vector(0);
        v[1] = -0.5;
        let literal = vector_literal(&v).unwrap();
        assert!(literal.starts_with("[1,-0.5,0,"));
        assert!(literal.ends_with(",0]"));
        assert_eq!(literal.matches(',').count(), EMBEDDING_DIMENSIONS - 1);
    }

    #[test]
    fn test_vector_literal_rejects_wrong_dimension() {
        let err = vector_literal(&[0.1, 0.2]).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidData(_)));
    }

    #[test]
    fn test_vector_literal_rejects_nan() {
        let mut v = unit_vector(3);
        v[7] = f32::NAN;
        assert!(vector_literal(&v).is_err());
    }
}
