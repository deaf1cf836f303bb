//! API response types

use serde::{Deserialize, Serialize};

use super::document::{ChunkId, DocumentStatus};

/// Per-file result of an upload request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUploadStatus {
    /// Filename the status refers to
    pub file_id: String,
    /// "success" or "failed"
    pub status: String,
    /// Number of chunks written when successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    /// Error message when failed, naming the phase that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileUploadStatus {
    pub fn success(file_id: impl Into<String>, chunks: usize) -> Self {
        Self {
            file_id: file_id.into(),
            status: "success".to_string(),
            chunks: Some(chunks),
            error: None,
        }
    }

    pub fn failed(file_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            status: "failed".to_string(),
            chunks: None,
            error: Some(error.into()),
        }
    }
}

/// Summary of a registered document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub file_path: String,
    pub byte_len: u64,
    pub fingerprint: String,
    pub status: DocumentStatus,
    pub chunk_count: usize,
}

/// List of registered documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesListResponse {
    pub files: Vec<DocumentSummary>,
}

/// One context block returned with an answer, with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlockView {
    pub chunk_id: ChunkId,
    pub file_path: String,
    pub ordinal: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub score: f32,
    pub content: String,
}

/// Answer to a search query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Short id correlating logs with this response
    pub query_id: String,
    /// The original question
    pub query: String,
    /// Generated answer; empty when nothing was retrieved
    pub answer: String,
    /// Context blocks the answer was grounded on
    pub documents: Vec<ContextBlockView>,
    /// Chunk ids returned by the vector store with no metadata row (degraded result)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped_chunks: Vec<ChunkId>,
    /// Model that produced the answer
    pub model: String,
    pub processing_time_ms: u64,
}

/// Result of a forced reindex or retry request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub status: String,
    pub message: String,
}
