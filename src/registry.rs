//! Source document registry
//!
//! Tracks uploaded files by path and content fingerprint. Registering
//! unchanged content is a no-op; a changed fingerprint flags the record
//! `Dirty` so the reconciler rebuilds its chunks. Registry mutations are the
//! trigger condition the reconciler consumes.

use std::path::Component;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::storage::MetadataStore;
use crate::types::document::{DocumentStatus, SourceDocument};

/// Result of a `register` call
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub document: SourceDocument,
    /// True when the record is new or its fingerprint changed, i.e. the
    /// document needs (re)indexing
    pub changed: bool,
}

/// Registry over the relational store
pub struct SourceRegistry {
    metadata: Arc<MetadataStore>,
}

impl SourceRegistry {
    pub fn new(metadata: Arc<MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Register a document under `file_path`.
    ///
    /// Idempotent for unchanged content: the existing record is returned
    /// untouched. A differing fingerprint updates length and modification
    /// time and flags the record `Dirty`.
    pub fn register(
        &self,
        file_path: &str,
        content: &[u8],
        metadata: Map<String, Value>,
    ) -> Result<RegisterOutcome> {
        validate_path(file_path)?;
        if content.is_empty() {
            return Err(Error::invalid_document(format!(
                "'{}' has no content",
                file_path
            )));
        }

        let fingerprint = SourceDocument::fingerprint_of(content);
        let now = Utc::now();

        if let Some(existing) = self.metadata.get_source(file_path)? {
            if existing.fingerprint == fingerprint {
                tracing::debug!("'{}' unchanged, skipping", file_path);
                return Ok(RegisterOutcome {
                    document: existing,
                    changed: false,
                });
            }

            let updated = SourceDocument {
                byte_len: content.len() as u64,
                fingerprint,
                status: DocumentStatus::Dirty,
                modified_at: now,
                metadata,
                ..existing
            };
            self.metadata.upsert_source(&updated)?;
            tracing::info!("'{}' changed, flagged for re-indexing", file_path);
            return Ok(RegisterOutcome {
                document: updated,
                changed: true,
            });
        }

        let document = SourceDocument {
            file_path: file_path.to_string(),
            byte_len: content.len() as u64,
            fingerprint,
            status: DocumentStatus::Dirty,
            created_at: now,
            modified_at: now,
            metadata,
        };
        self.metadata.upsert_source(&document)?;
        tracing::info!("Registered '{}' ({} bytes)", file_path, content.len());

        Ok(RegisterOutcome {
            document,
            changed: true,
        })
    }

    /// Get a registered document
    pub fn get(&self, file_path: &str) -> Result<SourceDocument> {
        self.metadata
            .get_source(file_path)?
            .ok_or_else(|| Error::NotFound(file_path.to_string()))
    }

    /// List all registered documents
    pub fn list(&self) -> Result<Vec<SourceDocument>> {
        self.metadata.list_sources()
    }
}

/// Reject paths that cannot serve as stable keys: empty, NUL bytes, absolute
/// paths, or parent traversal
fn validate_path(file_path: &str) -> Result<()> {
    if file_path.is_empty() {
        return Err(Error::invalid_document("file path is empty"));
    }
    if file_path.contains('\0') {
        return Err(Error::invalid_document("file path contains NUL"));
    }
    let path = std::path::Path::new(file_path);
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(Error::invalid_document(format!(
                    "file path '{}' traverses outside the store",
                    file_path
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::invalid_document(format!(
                    "file path '{}' must be relative",
                    file_path
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SourceRegistry {
        SourceRegistry::new(Arc::new(MetadataStore::in_memory().unwrap()))
    }

    #[test]
    fn register_is_idempotent_for_unchanged_content() {
        let registry = registry();

        let first = registry
            .register("uploads/doc1.txt", b"same bytes", Map::new())
            .unwrap();
        assert!(first.changed);

        let second = registry
            .register("uploads/doc1.txt", b"same bytes", Map::new())
            .unwrap();
        assert!(!second.changed);
        assert_eq!(second.document.fingerprint, first.document.fingerprint);
        assert_eq!(second.document.modified_at, first.document.modified_at);
    }

    #[test]
    fn changed_content_flags_dirty() {
        let registry = registry();

        registry
            .register("uploads/doc1.txt", b"version one", Map::new())
            .unwrap();
        let outcome = registry
            .register("uploads/doc1.txt", b"version two", Map::new())
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.document.status, DocumentStatus::Dirty);
        assert_eq!(outcome.document.byte_len, 11);
    }

    #[test]
    fn empty_content_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.register("uploads/doc1.txt", b"", Map::new()),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn malformed_paths_rejected() {
        let registry = registry();
        for bad in ["", "../escape.txt", "/abs/path.txt", "a\0b.txt"] {
            assert!(
                matches!(
                    registry.register(bad, b"content", Map::new()),
                    Err(Error::InvalidDocument(_))
                ),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn get_missing_is_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.get("uploads/nope.txt"),
            Err(Error::NotFound(_))
        ));
    }
}
