//! Indexing service: drives the registry, pipeline, and reconciler from
//! uploads and the boot-time scan

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::ingestion::SourceFormat;
use crate::registry::SourceRegistry;
use crate::storage::{FileStore, MetadataStore};
use crate::types::document::DocumentStatus;
use crate::types::response::DocumentSummary;

use super::coordinator::CommitResult;
use super::reconciler::{ReconcileOutcome, Reconciler};

/// Result of ingesting one file
#[derive(Debug)]
pub enum IngestOutcome {
    /// Chunks were (re)built and committed
    Indexed(CommitResult),
    /// Content fingerprint unchanged, nothing to do
    Unchanged,
}

/// Summary of the boot-time indexing pass
#[derive(Debug, Default)]
pub struct StartupIndexReport {
    pub indexed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Upload/boot orchestration over the core components
pub struct IndexingService {
    files: FileStore,
    registry: SourceRegistry,
    reconciler: Arc<Reconciler>,
    metadata: Arc<MetadataStore>,
    parallel_files: usize,
}

impl IndexingService {
    pub fn new(
        files: FileStore,
        registry: SourceRegistry,
        reconciler: Arc<Reconciler>,
        metadata: Arc<MetadataStore>,
        parallel_files: Option<usize>,
    ) -> Self {
        let parallel_files = parallel_files.unwrap_or_else(|| num_cpus::get().min(8)).max(1);
        Self {
            files,
            registry,
            reconciler,
            metadata,
            parallel_files,
        }
    }

    /// Save an upload, register it, and reconcile if the content changed.
    ///
    /// Identical re-uploads return [`IngestOutcome::Unchanged`] without
    /// touching either store.
    pub async fn ingest_upload(&self, filename: &str, data: &[u8]) -> Result<IngestOutcome> {
        let format = SourceFormat::detect(filename)?;
        let key = self.files.save(filename, data)?;
        self.sync_content(&key, filename, format, data).await
    }

    /// Re-read a stored file and bring both stores up to date with it
    pub async fn sync_stored(&self, key: &str) -> Result<IngestOutcome> {
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let format = SourceFormat::detect(&filename)?;
        let data = self.files.read(key)?;
        self.sync_content(key, &filename, format, &data).await
    }

    async fn sync_content(
        &self,
        key: &str,
        filename: &str,
        format: SourceFormat,
        data: &[u8],
    ) -> Result<IngestOutcome> {
        let mut metadata_map = Map::new();
        metadata_map.insert("filename".to_string(), Value::String(filename.to_string()));

        let outcome = self.registry.register(key, data, metadata_map.clone())?;
        if !outcome.changed && outcome.document.status == DocumentStatus::Clean {
            return Ok(IngestOutcome::Unchanged);
        }

        let text = format.extract_text(filename, data)?;
        match self.spawn_reindex(key, text, metadata_map).await? {
            ReconcileOutcome::Completed(result) => Ok(IngestOutcome::Indexed(result)),
            ReconcileOutcome::Cancelled => Ok(IngestOutcome::Unchanged),
        }
    }

    /// Run the reconcile unit on a detached task so it reaches a terminal
    /// state even if the invoking request is abandoned mid-flight.
    async fn spawn_reindex(
        &self,
        key: &str,
        text: String,
        metadata_map: Map<String, Value>,
    ) -> Result<ReconcileOutcome> {
        let reconciler = self.reconciler.clone();
        let key = key.to_string();
        let handle =
            tokio::spawn(async move { reconciler.reindex(&key, text, &metadata_map, None).await });
        handle
            .await
            .map_err(|e| Error::internal(format!("reindex task failed: {}", e)))?
    }

    /// Force a rebuild of a stored document regardless of its fingerprint
    pub async fn reindex_stored(&self, key: &str) -> Result<CommitResult> {
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let format = SourceFormat::detect(&filename)?;
        let data = self.files.read(key)?;

        let mut metadata_map = Map::new();
        metadata_map.insert("filename".to_string(), Value::String(filename.clone()));
        self.registry.register(key, &data, metadata_map.clone())?;

        let text = format.extract_text(&filename, &data)?;
        match self.spawn_reindex(key, text, metadata_map).await? {
            ReconcileOutcome::Completed(result) => Ok(result),
            ReconcileOutcome::Cancelled => Err(Error::internal("uncancellable reindex cancelled")),
        }
    }

    /// Re-run the vector write for a document with pending rows
    pub async fn retry_pending(&self, key: &str) -> Result<CommitResult> {
        let reconciler = self.reconciler.clone();
        let key_owned = key.to_string();
        let handle = tokio::spawn(async move { reconciler.retry_pending(&key_owned).await });
        handle
            .await
            .map_err(|e| Error::internal(format!("retry task failed: {}", e)))?
    }

    /// Remove a document from both stores and delete the stored file
    pub async fn remove(&self, key: &str) -> Result<()> {
        let reconciler = self.reconciler.clone();
        let key_owned = key.to_string();
        let handle = tokio::spawn(async move { reconciler.remove(&key_owned).await });
        handle
            .await
            .map_err(|e| Error::internal(format!("remove task failed: {}", e)))??;
        self.files.remove(key)
    }

    /// List registered documents with their chunk counts
    pub fn list(&self) -> Result<Vec<DocumentSummary>> {
        let docs = self.registry.list()?;
        let mut summaries = Vec::with_capacity(docs.len());
        for doc in docs {
            let chunk_count = self.metadata.count_chunks_for(&doc.file_path)?;
            summaries.push(DocumentSummary {
                file_path: doc.file_path,
                byte_len: doc.byte_len,
                fingerprint: doc.fingerprint,
                status: doc.status,
                chunk_count,
            });
        }
        Ok(summaries)
    }

    /// Boot task: walk the storage root and index whatever changed since the
    /// last run. Invoked once by the process entry point when
    /// `index_on_startup` is set.
    pub async fn index_all_on_startup(&self) -> StartupIndexReport {
        let keys = self.files.scan();
        tracing::info!(
            "Startup indexing: {} files, {} workers",
            keys.len(),
            self.parallel_files
        );

        let semaphore = Arc::new(Semaphore::new(self.parallel_files));
        let tasks = keys.iter().map(|key| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                Some((key.clone(), self.sync_stored(key).await))
            }
        });

        let mut report = StartupIndexReport::default();
        for entry in futures::future::join_all(tasks).await.into_iter().flatten() {
            match entry {
                (_, Ok(IngestOutcome::Indexed(result))) => {
                    tracing::info!(
                        "Indexed '{}' ({} chunks)",
                        result.file_path,
                        result.chunks_written
                    );
                    report.indexed += 1;
                }
                (_, Ok(IngestOutcome::Unchanged)) => report.unchanged += 1,
                (key, Err(e)) => {
                    tracing::error!("Startup indexing of '{}' failed: {}", key, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Startup indexing done: {} indexed, {} unchanged, {} failed",
            report.indexed,
            report.unchanged,
            report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{ChunkingConfig, SplitUnit};
    use crate::indexing::coordinator::tests::{test_retry, MockEmbedder};
    use crate::indexing::coordinator::WriteCoordinator;
    use crate::ingestion::IndexPipeline;
    use crate::providers::{EmbeddingProvider, InMemoryVectorStore, VectorStoreProvider};

    fn service_with(dir: &std::path::Path) -> (IndexingService, Arc<InMemoryVectorStore>) {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbedder { dimensions: 8 });
        let chunking = ChunkingConfig {
            split_unit: SplitUnit::Word,
            split_length: 5,
            split_overlap: 1,
        };
        let coordinator = WriteCoordinator::new(
            metadata.clone(),
            vectors.clone() as Arc<dyn VectorStoreProvider>,
            8,
            test_retry(),
        );
        let reconciler = Arc::new(Reconciler::new(
            metadata.clone(),
            vectors.clone() as Arc<dyn VectorStoreProvider>,
            coordinator,
            IndexPipeline::from_config(&chunking).unwrap(),
            embedder,
        ));
        let service = IndexingService::new(
            FileStore::new(dir).unwrap(),
            SourceRegistry::new(metadata.clone()),
            reconciler,
            metadata,
            Some(2),
        );
        (service, vectors)
    }

    #[tokio::test]
    async fn upload_indexes_and_identical_reupload_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (service, vectors) = service_with(dir.path());

        let outcome = service
            .ingest_upload("doc1.txt", b"six words of text right here")
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Indexed(_)));
        let count_after_first = vectors.count().await.unwrap();
        assert!(count_after_first > 0);

        let outcome = service
            .ingest_upload("doc1.txt", b"six words of text right here")
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Unchanged));
        assert_eq!(vectors.count().await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected_before_saving() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_with(dir.path());

        let result = service.ingest_upload("image.png", b"bytes").await;
        assert!(matches!(result, Err(Error::InvalidDocument(_))));
        assert!(service.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_file_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let (service, vectors) = service_with(dir.path());

        service
            .ingest_upload("doc1.txt", b"words to be forgotten soon")
            .await
            .unwrap();
        service.remove("uploads/doc1.txt").await.unwrap();

        assert!(service.list().unwrap().is_empty());
        assert_eq!(vectors.count().await.unwrap(), 0);
        assert!(matches!(
            service.remove("uploads/doc1.txt").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn startup_scan_indexes_stored_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (service, _) = service_with(dir.path());
            // seed files without indexing them
            let store = FileStore::new(dir.path()).unwrap();
            store.save("a.txt", b"first file body").unwrap();
            store.save("b.md", b"# second\n\nfile body").unwrap();
            drop(service);
        }

        let (service, vectors) = service_with(dir.path());
        let report = service.index_all_on_startup().await;

        assert_eq!(report.indexed, 2);
        assert_eq!(report.failed, 0);
        assert!(vectors.count().await.unwrap() > 0);
        assert_eq!(service.list().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_reports_chunk_counts() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_with(dir.path());

        service
            .ingest_upload("doc1.txt", b"one two three four five six seven eight nine ten")
            .await
            .unwrap();

        let files = service.list().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_path, "uploads/doc1.txt");
        // 10 words, length 5, overlap 1 -> chunks at 0, 4, 8
        assert_eq!(files[0].chunk_count, 3);
        assert_eq!(files[0].status, DocumentStatus::Clean);
    }
}
