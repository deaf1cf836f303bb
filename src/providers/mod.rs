//! Provider abstractions for embeddings, generation, and vector storage
//!
//! Trait-based seams over the external collaborators so backends can be
//! swapped by configuration and doubled in tests.

pub mod embedding;
pub mod generation;
pub mod memory;
pub mod ollama;
pub mod qdrant;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use generation::GenerationProvider;
pub use memory::InMemoryVectorStore;
pub use ollama::OllamaClient;
pub use qdrant::QdrantStore;
pub use vector_store::{VectorHit, VectorPoint, VectorStoreProvider};
