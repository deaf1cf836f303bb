//! Shared application state wired from configuration

use std::sync::Arc;

use crate::config::{RagConfig, VectorBackend};
use crate::error::Result;
use crate::indexing::coordinator::RetryPolicy;
use crate::indexing::{IndexingService, Reconciler, WriteCoordinator};
use crate::ingestion::IndexPipeline;
use crate::providers::{
    EmbeddingProvider, GenerationProvider, InMemoryVectorStore, OllamaClient, QdrantStore,
    VectorStoreProvider,
};
use crate::registry::SourceRegistry;
use crate::retrieval::{ContextAssembler, QueryService};
use crate::storage::{FileStore, MetadataStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<RagConfig>,
    indexing: Arc<IndexingService>,
    query: Arc<QueryService>,
    vectors: Arc<dyn VectorStoreProvider>,
}

impl AppState {
    /// Build all components from validated configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;

        let metadata = Arc::new(MetadataStore::new(&config.storage.db_path)?);

        let vectors: Arc<dyn VectorStoreProvider> = match config.vector_store.backend {
            VectorBackend::Qdrant => {
                let store = QdrantStore::new(&config.vector_store)?;
                store.ensure_collection(config.embedding.dimensions).await?;
                Arc::new(store)
            }
            VectorBackend::Memory => {
                tracing::warn!("Using in-memory vector store; vectors are lost on restart");
                Arc::new(InMemoryVectorStore::new())
            }
        };

        let ollama = Arc::new(OllamaClient::new(&config.embedding, &config.generation)?);
        let embedder: Arc<dyn EmbeddingProvider> = ollama.clone();
        let generator: Arc<dyn GenerationProvider> = ollama;

        let coordinator = WriteCoordinator::new(
            metadata.clone(),
            vectors.clone(),
            config.embedding.dimensions,
            RetryPolicy::from_config(&config.vector_store),
        );
        let pipeline = IndexPipeline::from_config(&config.chunking)?;
        let reconciler = Arc::new(Reconciler::new(
            metadata.clone(),
            vectors.clone(),
            coordinator,
            pipeline,
            embedder.clone(),
        ));

        let files = FileStore::new(&config.storage.file_storage_path)?;
        let registry = SourceRegistry::new(metadata.clone());
        let indexing = Arc::new(IndexingService::new(
            files,
            registry,
            reconciler,
            metadata.clone(),
            config.parallel_files,
        ));

        let assembler = ContextAssembler::new(metadata, &config.chunking);
        let query = Arc::new(QueryService::new(
            embedder,
            vectors.clone(),
            assembler,
            generator,
            &config.generation,
        ));

        Ok(Self {
            config: Arc::new(config),
            indexing,
            query,
            vectors,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn indexing(&self) -> &IndexingService {
        &self.indexing
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// Readiness: the vector store must be reachable
    pub async fn is_ready(&self) -> bool {
        self.vectors.health_check().await.unwrap_or(false)
    }
}
