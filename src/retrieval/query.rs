//! Query service: retrieval, context assembly, and answer generation

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, GenerationProvider, VectorStoreProvider};
use crate::types::query::SearchQuery;
use crate::types::response::{ContextBlockView, QueryResponse};

use super::assembler::{ContextAssembler, ContextBlock, ContextOrdering};

/// Prompt construction for retrieval-augmented generation
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the generation prompt from the question and assembled context
    pub fn build(question: &str, blocks: &[ContextBlock]) -> String {
        let mut context = String::new();
        for block in blocks {
            context.push_str(&block.content);
            context.push('\n');
        }

        format!(
            "Given the following context, answer the question.\n\
             Context:\n{context}\n\
             Question: {question}\n\
             Answer:",
        )
    }
}

/// Answers questions over the indexed corpus
pub struct QueryService {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStoreProvider>,
    assembler: ContextAssembler,
    generator: Arc<dyn GenerationProvider>,
    available_models: Vec<String>,
}

impl QueryService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStoreProvider>,
        assembler: ContextAssembler,
        generator: Arc<dyn GenerationProvider>,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            embedder,
            vectors,
            assembler,
            generator,
            available_models: generation.available_models.clone(),
        }
    }

    /// Models a request may select through its `model` field
    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// Run retrieval and generation for a search request
    pub async fn search(&self, request: &SearchQuery) -> Result<QueryResponse> {
        let start = Instant::now();
        let query_id = Uuid::new_v4().simple().to_string()[..8].to_string();

        if request.query.trim().is_empty() {
            return Err(Error::invalid_document("query is empty"));
        }
        if let Some(model) = &request.model {
            if !self.available_models.is_empty() && !self.available_models.contains(model) {
                return Err(Error::invalid_configuration(format!(
                    "unknown model '{}'",
                    model
                )));
            }
        }

        tracing::info!("[{}] query: \"{}\"", query_id, request.query);

        let embedding = self.embedder.embed(&request.query).await?;
        // fetch extra so overlap dedup still fills top_k
        let hits = self
            .vectors
            .search(&embedding.dense, request.top_k * 2)
            .await?;

        let ordering = if request.document_order {
            ContextOrdering::DocumentOrder
        } else {
            ContextOrdering::ScoreDescending
        };
        let mut context = self.assembler.assemble(&hits, request.top_k, ordering)?;

        if let Some(filters) = &request.filters {
            context.blocks.retain(|b| matches_filters(&b.metadata, filters));
        }

        let model = request
            .model
            .as_deref()
            .unwrap_or_else(|| self.generator.model());

        let answer = if context.blocks.is_empty() {
            tracing::info!("[{}] no context retrieved", query_id);
            String::new()
        } else {
            let prompt = PromptBuilder::build(&request.query, &context.blocks);
            self.generator.generate(&prompt, request.model.as_deref()).await?
        };

        let documents = context
            .blocks
            .iter()
            .map(|b| ContextBlockView {
                chunk_id: b.id,
                file_path: b.file_path.clone(),
                ordinal: b.ordinal,
                page_number: b.page_number,
                score: b.score,
                content: b.content.clone(),
            })
            .collect();

        Ok(QueryResponse {
            query_id,
            query: request.query.clone(),
            answer,
            documents,
            skipped_chunks: context.skipped,
            model: model.to_string(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Every filter key must be present and equal in the chunk metadata
fn matches_filters(metadata: &Map<String, Value>, filters: &Map<String, Value>) -> bool {
    filters
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::Map;

    use crate::config::{ChunkingConfig, GenerationConfig, SplitUnit};
    use crate::indexing::coordinator::tests::{test_retry, MockEmbedder};
    use crate::indexing::coordinator::WriteCoordinator;
    use crate::providers::InMemoryVectorStore;
    use crate::storage::MetadataStore;
    use crate::types::document::{Chunk, DocumentStatus, EmbeddedChunk, SourceDocument};

    struct CannedGenerator;

    #[async_trait]
    impl GenerationProvider for CannedGenerator {
        async fn generate(&self, prompt: &str, _model: Option<&str>) -> Result<String> {
            assert!(prompt.contains("Question:"));
            Ok("canned answer".to_string())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-model"
        }
    }

    async fn indexed_fixture() -> (QueryService, Arc<MetadataStore>) {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(MockEmbedder { dimensions: 8 });

        // index one document with three chunks by hand
        let now = chrono::Utc::now();
        metadata
            .upsert_source(&SourceDocument {
                file_path: "uploads/doc1.txt".to_string(),
                byte_len: 10,
                fingerprint: SourceDocument::fingerprint_of(b"doc1"),
                status: DocumentStatus::Clean,
                created_at: now,
                modified_at: now,
                metadata: Map::new(),
            })
            .unwrap();

        let coordinator = WriteCoordinator::new(
            metadata.clone(),
            vectors.clone() as Arc<dyn VectorStoreProvider>,
            8,
            test_retry(),
        );
        let mut embedded = Vec::new();
        for (i, text) in ["first block", "second block", "third block"].iter().enumerate() {
            let chunk = Chunk::new("uploads/doc1.txt", i as u32, i * 220, *text, Map::new());
            let embedding = embedder.embed(text).await.unwrap();
            embedded.push(EmbeddedChunk { chunk, embedding });
        }
        coordinator.commit("uploads/doc1.txt", &embedded).await.unwrap();

        let chunking = ChunkingConfig {
            split_unit: SplitUnit::Word,
            split_length: 250,
            split_overlap: 30,
        };
        let generation = GenerationConfig::default();
        let service = QueryService::new(
            embedder,
            vectors,
            ContextAssembler::new(metadata.clone(), &chunking),
            Arc::new(CannedGenerator),
            &generation,
        );
        (service, metadata)
    }

    fn request(query: &str) -> SearchQuery {
        SearchQuery {
            query: query.to_string(),
            filters: None,
            model: None,
            top_k: 3,
            document_order: false,
        }
    }

    #[tokio::test]
    async fn search_returns_grounded_answer_with_provenance() {
        let (service, _) = indexed_fixture().await;

        let response = service.search(&request("first block")).await.unwrap();

        assert_eq!(response.answer, "canned answer");
        assert!(!response.documents.is_empty());
        assert_eq!(response.model, "canned-model");
        // score-descending ordering
        for pair in response.documents.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (service, _) = indexed_fixture().await;
        assert!(matches!(
            service.search(&request("   ")).await,
            Err(Error::InvalidDocument(_))
        ));
    }

    #[tokio::test]
    async fn unknown_model_override_is_rejected() {
        let (service, _) = indexed_fixture().await;
        let mut req = request("anything");
        req.model = Some("no-such-model".to_string());
        assert!(matches!(
            service.search(&req).await,
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn missing_metadata_degrades_instead_of_failing() {
        let (service, metadata) = indexed_fixture().await;

        // orphan the vector entries by clearing relational rows
        metadata.delete_chunks_for("uploads/doc1.txt").unwrap();

        let response = service.search(&request("first block")).await.unwrap();
        assert!(response.documents.is_empty());
        assert!(!response.skipped_chunks.is_empty());
        assert!(response.answer.is_empty());
    }
}
