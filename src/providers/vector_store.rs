//! Vector store provider trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::document::{ChunkId, SparseVector};

/// A point to upsert into the vector store
#[derive(Debug, Clone)]
pub struct VectorPoint {
    /// Chunk id, the upsert key
    pub id: ChunkId,
    /// Owning source document, kept in the payload for bulk deletes
    pub file_path: String,
    /// Dense embedding
    pub dense: Vec<f32>,
    /// Optional sparse companion
    pub sparse: Option<SparseVector>,
}

/// A similarity search hit
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: ChunkId,
    pub score: f32,
}

/// Trait for vector storage and similarity search
///
/// Writes are idempotent upserts keyed by chunk id; re-sending the same batch
/// after a partial failure converges instead of duplicating.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Upsert points by id
    async fn upsert(&self, points: &[VectorPoint]) -> Result<()>;

    /// Delete all points belonging to a source document, returning how many
    /// were removed
    async fn delete_by_source(&self, file_path: &str) -> Result<usize>;

    /// Ids currently stored for a source document
    async fn ids_for_source(&self, file_path: &str) -> Result<Vec<ChunkId>>;

    /// Similarity search returning (id, score) pairs, best first
    async fn search(&self, dense: &[f32], top_k: usize) -> Result<Vec<VectorHit>>;

    /// Total number of stored points
    async fn count(&self) -> Result<usize>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
