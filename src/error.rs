//! Error types for the indexing and query services

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for wrag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the ingestion, indexing, and query paths
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected input document (empty content, malformed path, unsupported format)
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No record for the given file path
    #[error("not found: {0}")]
    NotFound(String),

    /// Relational write aborted; the transaction rolled back, nothing is visible
    #[error("metadata write failed: {0}")]
    MetadataWriteFailed(String),

    /// Vector store write exhausted its retries; relational rows stay pending_index
    #[error("vector write failed: {0}")]
    VectorWriteFailed(String),

    /// Embedding provider error or dimension mismatch
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Deletion failed mid-reconciliation; the document is left in Failed and
    /// requires operator attention
    #[error("reconciliation failed for '{file_path}': {message}")]
    ReconciliationFailed { file_path: String, message: String },

    /// A retrieved chunk id had no relational counterpart; logged and skipped
    #[error("chunk {0} returned by the vector store has no metadata row")]
    PartialRetrievalInconsistency(String),

    /// Generation provider error
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid document error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a metadata write error
    pub fn metadata_write(message: impl Into<String>) -> Self {
        Self::MetadataWriteFailed(message.into())
    }

    /// Create a vector write error
    pub fn vector_write(message: impl Into<String>) -> Self {
        Self::VectorWriteFailed(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingFailed(message.into())
    }

    /// Create a reconciliation error
    pub fn reconciliation(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReconciliationFailed {
            file_path: file_path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for errors worth another attempt (transient store failures)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VectorWriteFailed(_) | Error::Http(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::InvalidDocument(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_document", msg.clone())
            }
            Error::InvalidConfiguration(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_configuration", msg.clone())
            }
            Error::NotFound(path) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("not found: {}", path),
            ),
            Error::MetadataWriteFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "metadata_write_failed",
                msg.clone(),
            ),
            Error::VectorWriteFailed(msg) => {
                (StatusCode::BAD_GATEWAY, "vector_write_failed", msg.clone())
            }
            Error::EmbeddingFailed(msg) => {
                (StatusCode::BAD_GATEWAY, "embedding_failed", msg.clone())
            }
            Error::ReconciliationFailed { file_path, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "reconciliation_failed",
                format!("{}: {}", file_path, message),
            ),
            Error::PartialRetrievalInconsistency(id) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "partial_retrieval_inconsistency",
                id.clone(),
            ),
            Error::GenerationFailed(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "generation_failed", msg.clone())
            }
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
