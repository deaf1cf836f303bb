//! Core types for documents, chunks, queries, and responses

pub mod document;
pub mod query;
pub mod response;

pub use document::{
    Chunk, ChunkId, DocumentStatus, EmbeddedChunk, Embedding, SourceDocument, SparseVector,
};
pub use query::SearchQuery;
pub use response::{ContextBlockView, FileUploadStatus, QueryResponse};
