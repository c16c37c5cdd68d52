//! Embedding support for similarity search and ingestion.

use async_trait::async_trait;

use crate::error::ChatError;

/// Turns text into a fixed-dimension embedding vector.
///
/// Implementations call an embedding model. Tests use deterministic fakes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ChatError>;

    /// Embed several texts, preserving input order.
    ///
    /// Default implementation embeds one text at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ChatError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Number of dimensions produced by this embedder.
    fn dimensions(&self) -> usize;
}
