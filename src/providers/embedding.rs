//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::document::Embedding;

/// Trait for turning text into embeddings
///
/// Assumed deterministic per model version: the same text embeds to the same
/// vector, which is what makes re-running the vector write for pending rows
/// safe.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed multiple texts
    ///
    /// Default implementation calls `embed` sequentially; implementations
    /// with batch endpoints should override.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Dense dimension this provider produces
    fn dimensions(&self) -> usize;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
