//! Dual-store write coordinator
//!
//! Persists a batch of embedded chunks to the relational store and the vector
//! store as one logical unit. The relational transaction is the only
//! store-native atomicity used; cross-store consistency comes from ordering
//! and idempotent upserts keyed by chunk id.
//!
//! Protocol: the relational write commits first (rows flagged
//! `pending_index`); the vector write follows with bounded exponential
//! backoff. A relational failure aborts before the vector store is touched.
//! A vector failure leaves the rows pending, and `retry_pending` re-runs the
//! vector step alone from the relational rows, which are the source of truth
//! for what should exist.

use std::sync::Arc;
use std::time::Duration;

use crate::config::VectorStoreConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorPoint, VectorStoreProvider};
use crate::storage::MetadataStore;
use crate::types::document::{Chunk, EmbeddedChunk};

/// Bounded exponential backoff for the vector write step
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &VectorStoreConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct CommitResult {
    pub file_path: String,
    pub chunks_written: usize,
    /// Vector write attempts it took (1 = no retry needed)
    pub vector_attempts: u32,
}

/// Coordinates writes across the relational and vector stores
pub struct WriteCoordinator {
    metadata: Arc<MetadataStore>,
    vectors: Arc<dyn VectorStoreProvider>,
    dimensions: usize,
    retry: RetryPolicy,
}

impl WriteCoordinator {
    pub fn new(
        metadata: Arc<MetadataStore>,
        vectors: Arc<dyn VectorStoreProvider>,
        dimensions: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            metadata,
            vectors,
            dimensions,
            retry,
        }
    }

    /// Persist a batch of embedded chunks for `file_path` to both stores.
    ///
    /// After a successful return, every chunk id in the relational store for
    /// the key has a vector entry and vice versa.
    pub async fn commit(
        &self,
        file_path: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<CommitResult> {
        self.check_dimensions(chunks)?;

        // Step 1: relational transaction. Input errors here are the caller's
        // problem and are not retried.
        let drafts: Vec<Chunk> = chunks.iter().map(|c| c.chunk.clone()).collect();
        self.metadata.replace_chunks(file_path, &drafts)?;

        // Step 2: vector upserts, retried; rows stay pending on exhaustion.
        let points = to_points(chunks);
        let attempts = self.push_vectors(file_path, &points).await?;

        self.metadata.mark_indexed(file_path)?;

        tracing::info!(
            "Committed {} chunks for '{}' ({} vector attempt(s))",
            chunks.len(),
            file_path,
            attempts
        );

        Ok(CommitResult {
            file_path: file_path.to_string(),
            chunks_written: chunks.len(),
            vector_attempts: attempts,
        })
    }

    /// Re-run the vector step alone for rows left `pending_index` by an
    /// earlier failed commit.
    ///
    /// The chunk texts are re-embedded (embeddings are deterministic per
    /// model version) and upserted under their existing ids, so relational
    /// rows are neither duplicated nor rewritten.
    pub async fn retry_pending(
        &self,
        file_path: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<CommitResult> {
        if !self.metadata.has_pending(file_path)? {
            return Ok(CommitResult {
                file_path: file_path.to_string(),
                chunks_written: 0,
                vector_attempts: 0,
            });
        }

        let chunks = self.metadata.chunks_for(file_path)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();
        self.check_dimensions(&embedded)?;

        let points = to_points(&embedded);
        let attempts = self.push_vectors(file_path, &points).await?;
        self.metadata.mark_indexed(file_path)?;

        tracing::info!(
            "Retried vector write for '{}': {} chunks restored",
            file_path,
            embedded.len()
        );

        Ok(CommitResult {
            file_path: file_path.to_string(),
            chunks_written: embedded.len(),
            vector_attempts: attempts,
        })
    }

    /// Upsert with bounded exponential backoff; returns the attempt count
    async fn push_vectors(&self, file_path: &str, points: &[VectorPoint]) -> Result<u32> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.vectors.upsert(points).await {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt <= self.retry.max_retries => {
                    let delay = self.retry.base_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "Vector write for '{}' failed (attempt {}/{}): {}; retrying in {:?}",
                        file_path,
                        attempt,
                        self.retry.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Vector write for '{}' exhausted {} attempts; rows left pending_index",
                        file_path,
                        attempt
                    );
                    return Err(Error::vector_write(format!(
                        "'{}' after {} attempts: {}",
                        file_path, attempt, e
                    )));
                }
            }
        }
    }

    fn check_dimensions(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        for ec in chunks {
            if ec.embedding.dense.len() != self.dimensions {
                return Err(Error::embedding(format!(
                    "chunk {} has {} dimensions, expected {}",
                    ec.chunk.id,
                    ec.embedding.dense.len(),
                    self.dimensions
                )));
            }
        }
        Ok(())
    }
}

fn to_points(chunks: &[EmbeddedChunk]) -> Vec<VectorPoint> {
    chunks
        .iter()
        .map(|ec| VectorPoint {
            id: ec.chunk.id,
            file_path: ec.chunk.file_path.clone(),
            dense: ec.embedding.dense.clone(),
            sparse: ec.embedding.sparse.clone(),
        })
        .collect()
}
