//! Re-indexing and removal reconciler
//!
//! Per-document state machine `Clean → Dirty → Reindexing → Clean | Failed`.
//! Entering `Reindexing` deletes the document's chunks from the vector store
//! first and the relational store second, so a changed document never has
//! stale chunks retrievable, then recreates through the coordinator.
//!
//! All mutations for one `file_path` are serialized through a scoped lock;
//! distinct paths proceed in parallel. Lock entries are dropped once released
//! so the table does not grow with the corpus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::ingestion::IndexPipeline;
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::storage::MetadataStore;
use crate::types::document::{DocumentStatus, EmbeddedChunk};

use super::coordinator::{CommitResult, WriteCoordinator};

/// Outcome of a reconcile call
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Rebuild ran to completion
    Completed(CommitResult),
    /// A cancellation request arrived before the delete phase began
    Cancelled,
}

type LockTable = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Scoped per-document lock; the table entry is removed on release when no
/// other task is waiting on it
struct KeyLock {
    key: String,
    locks: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Keeps the relational and vector stores in agreement per document
pub struct Reconciler {
    metadata: Arc<MetadataStore>,
    vectors: Arc<dyn VectorStoreProvider>,
    coordinator: WriteCoordinator,
    pipeline: IndexPipeline,
    embedder: Arc<dyn EmbeddingProvider>,
    locks: LockTable,
}

impl Reconciler {
    pub fn new(
        metadata: Arc<MetadataStore>,
        vectors: Arc<dyn VectorStoreProvider>,
        coordinator: WriteCoordinator,
        pipeline: IndexPipeline,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            metadata,
            vectors,
            coordinator,
            pipeline,
            embedder,
            locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock(&self, key: &str) -> KeyLock {
        let mutex = {
            let entry = self
                .locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            entry.value().clone()
        };
        let guard = mutex.lock_owned().await;
        KeyLock {
            key: key.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of live lock entries (drained once operations finish)
    pub fn lock_table_len(&self) -> usize {
        self.locks.len()
    }

    /// Rebuild all chunks for a registered document from its current text.
    ///
    /// `cancel` is honored only before the delete phase; once deletion has
    /// started the operation runs to a terminal state so the stores are never
    /// left half-reconciled.
    pub async fn reindex(
        &self,
        file_path: &str,
        raw_text: String,
        metadata_map: &Map<String, Value>,
        cancel: Option<&AtomicBool>,
    ) -> Result<ReconcileOutcome> {
        let _lock = self.lock(file_path).await;

        // document must be registered first
        self.metadata
            .get_source(file_path)?
            .ok_or_else(|| Error::NotFound(file_path.to_string()))?;

        // last safe boundary for cancellation
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                tracing::info!("Reindex of '{}' cancelled before delete phase", file_path);
                return Ok(ReconcileOutcome::Cancelled);
            }
        }

        self.metadata.set_status(file_path, DocumentStatus::Reindexing)?;
        self.delete_both_stores(file_path).await?;

        // recreate: split, embed, commit
        let chunks = match self.pipeline.run(file_path, raw_text, metadata_map) {
            Ok(chunks) => chunks,
            Err(e) => {
                self.mark(file_path, DocumentStatus::Dirty);
                return Err(e);
            }
        };

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                // both stores agree (zero chunks); safe to retry later
                self.mark(file_path, DocumentStatus::Dirty);
                return Err(e);
            }
        };

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();

        match self.coordinator.commit(file_path, &embedded).await {
            Ok(result) => {
                self.metadata.set_status(file_path, DocumentStatus::Clean)?;
                Ok(ReconcileOutcome::Completed(result))
            }
            Err(e) => {
                // a VectorWriteFailed here left relational rows pending, so a
                // retry of the vector step alone converges; either way the
                // document still needs indexing
                self.mark(file_path, DocumentStatus::Dirty);
                Err(e)
            }
        }
    }

    /// Remove a document and all derived chunks from both stores.
    ///
    /// Same deletion order as re-indexing, no recreation; the terminal state
    /// is the record's absence.
    pub async fn remove(&self, file_path: &str) -> Result<()> {
        let _lock = self.lock(file_path).await;

        self.metadata
            .get_source(file_path)?
            .ok_or_else(|| Error::NotFound(file_path.to_string()))?;

        self.metadata.set_status(file_path, DocumentStatus::Reindexing)?;
        self.delete_both_stores(file_path).await?;
        self.metadata.delete_source(file_path)?;

        tracing::info!("Removed '{}' from both stores", file_path);
        Ok(())
    }

    /// Re-run the vector write for rows left pending by an earlier commit
    pub async fn retry_pending(&self, file_path: &str) -> Result<CommitResult> {
        let _lock = self.lock(file_path).await;

        self.metadata
            .get_source(file_path)?
            .ok_or_else(|| Error::NotFound(file_path.to_string()))?;

        let result = self
            .coordinator
            .retry_pending(file_path, self.embedder.as_ref())
            .await?;
        if result.chunks_written > 0 {
            self.metadata.set_status(file_path, DocumentStatus::Clean)?;
        }
        Ok(result)
    }

    /// Delete vectors first, then relational rows. A failure here leaves the
    /// document `Failed`: partial deletion followed by partial recreation
    /// could duplicate or lose chunks, so an operator has to look.
    async fn delete_both_stores(&self, file_path: &str) -> Result<()> {
        if let Err(e) = self.vectors.delete_by_source(file_path).await {
            self.mark(file_path, DocumentStatus::Failed);
            return Err(Error::reconciliation(
                file_path,
                format!("vector delete failed: {}", e),
            ));
        }

        if let Err(e) = self.metadata.delete_chunks_for(file_path) {
            self.mark(file_path, DocumentStatus::Failed);
            return Err(Error::reconciliation(
                file_path,
                format!("relational delete failed: {}", e),
            ));
        }

        Ok(())
    }

    fn mark(&self, file_path: &str, status: DocumentStatus) {
        if let Err(e) = self.metadata.set_status(file_path, status) {
            tracing::error!("Failed to update status of '{}': {}", file_path, e);
        }
    }
}
