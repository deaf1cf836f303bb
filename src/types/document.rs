//! Source document and chunk entities
//!
//! A `SourceDocument` is keyed by its file path and carries a content
//! fingerprint. Chunks derive their identity from `(file_path, ordinal)` so
//! re-splitting an unchanged document reproduces the same ids in both stores.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Indexing state of a source document.
///
/// `Dirty` marks a fingerprint change or pending removal; `Failed` is terminal
/// until an operator intervenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Clean,
    Dirty,
    Reindexing,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Clean => "clean",
            DocumentStatus::Dirty => "dirty",
            DocumentStatus::Reindexing => "reindexing",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "clean" => DocumentStatus::Clean,
            "dirty" => DocumentStatus::Dirty,
            "reindexing" => DocumentStatus::Reindexing,
            _ => DocumentStatus::Failed,
        }
    }
}

/// A registered source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Unique file path, the stable key for the document
    pub file_path: String,
    /// Content length in bytes
    pub byte_len: u64,
    /// SHA-256 hex digest of the content
    pub fingerprint: String,
    /// Indexing state
    pub status: DocumentStatus,
    /// First registration time
    pub created_at: DateTime<Utc>,
    /// Last content change
    pub modified_at: DateTime<Utc>,
    /// Arbitrary metadata, inherited by chunks
    pub metadata: Map<String, Value>,
}

impl SourceDocument {
    /// Compute the content fingerprint used for change detection
    pub fn fingerprint_of(content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }
}

/// Stable chunk identifier derived from `(file_path, ordinal)`
///
/// The first 16 bytes of SHA-256 over the pair, carried as a UUID so the same
/// id keys the relational row and the vector store point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(Uuid);

impl ChunkId {
    /// Derive the id for a chunk of `file_path` at `ordinal`
    pub fn derive(file_path: &str, ordinal: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(ordinal.to_le_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        ChunkId(Uuid::from_bytes(bytes))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(ChunkId)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ChunkId {
    fn from(id: Uuid) -> Self {
        ChunkId(id)
    }
}

/// A contiguous slice of a source document's text, the unit of embedding and
/// retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier, see [`ChunkId::derive`]
    pub id: ChunkId,
    /// Owning source document key
    pub file_path: String,
    /// Position within the document, contiguous from 0
    pub ordinal: u32,
    /// Page hint for paginated sources
    pub page_number: Option<u32>,
    /// Offset of the first split unit covered by this chunk
    pub split_start: usize,
    /// Chunk text
    pub content: String,
    /// Metadata, inherited from the source document
    pub metadata: Map<String, Value>,
}

impl Chunk {
    pub fn new(
        file_path: impl Into<String>,
        ordinal: u32,
        split_start: usize,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            id: ChunkId::derive(&file_path, ordinal),
            file_path,
            ordinal,
            page_number: None,
            split_start,
            content: content.into(),
            metadata,
        }
    }
}

/// Sparse embedding as index/value pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// Embedding produced by the external provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Dense vector of the configured dimension
    pub dense: Vec<f32>,
    /// Optional sparse companion for hybrid retrieval
    pub sparse: Option<SparseVector>,
}

impl Embedding {
    pub fn dense(values: Vec<f32>) -> Self {
        Self {
            dense: values,
            sparse: None,
        }
    }
}

/// A chunk paired with its computed embedding, ready for the coordinator
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let a = ChunkId::derive("uploads/doc1.txt", 0);
        let b = ChunkId::derive("uploads/doc1.txt", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_varies_by_ordinal_and_path() {
        let a = ChunkId::derive("uploads/doc1.txt", 0);
        let b = ChunkId::derive("uploads/doc1.txt", 1);
        let c = ChunkId::derive("uploads/doc2.txt", 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = SourceDocument::fingerprint_of(b"hello");
        let b = SourceDocument::fingerprint_of(b"hello");
        let c = SourceDocument::fingerprint_of(b"hello!");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
