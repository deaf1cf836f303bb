//! wrag: RAG backend with dual-store document indexing and citation-aware answers
//!
//! Source documents are fingerprinted and split into chunks with stable identifiers.
//! Chunk metadata lives in a relational store (SQLite) and chunk vectors in a
//! vector store, kept consistent by a write coordinator and a per-document
//! reconciler. Embedding and generation are delegated to external providers.

pub mod config;
pub mod error;
pub mod indexing;
pub mod ingestion;
pub mod providers;
pub mod registry;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, ChunkId, DocumentStatus, EmbeddedChunk, SourceDocument},
    query::SearchQuery,
    response::QueryResponse,
};
