//! SQLite store for source documents and chunk metadata
//!
//! This is the source of truth for what should exist in the vector store.
//! Chunk rows reference their source document by `file_path` with cascade
//! delete; `pending_index` marks rows whose vectors have not been confirmed
//! written yet.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Map;

use crate::error::{Error, Result};
use crate::types::document::{Chunk, ChunkId, DocumentStatus, SourceDocument};

/// SQLite-backed metadata store
pub struct MetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::internal(format!("Failed to open database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::internal(format!("Failed to open in-memory database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::internal(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS source_documents (
                file_path   TEXT PRIMARY KEY,
                byte_len    INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'clean',
                created_at  TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                metadata    TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_source_documents_status
                ON source_documents(status);

            CREATE TABLE IF NOT EXISTS chunks (
                id            TEXT PRIMARY KEY,
                file_path     TEXT NOT NULL
                              REFERENCES source_documents(file_path) ON DELETE CASCADE,
                ordinal       INTEGER NOT NULL,
                page_number   INTEGER,
                split_start   INTEGER NOT NULL,
                content       TEXT NOT NULL,
                metadata      TEXT,
                pending_index INTEGER NOT NULL DEFAULT 1,
                created_at    TEXT NOT NULL,
                UNIQUE(file_path, ordinal)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path);
            CREATE INDEX IF NOT EXISTS idx_chunks_pending ON chunks(pending_index);
        "#,
        )
        .map_err(|e| Error::internal(format!("Failed to run migrations: {}", e)))?;

        tracing::debug!("Metadata store migrations complete");
        Ok(())
    }

    // ==================== Source document operations ====================

    /// Insert or update a source document record
    pub fn upsert_source(&self, doc: &SourceDocument) -> Result<()> {
        let conn = self.conn.lock();

        let metadata_json = serde_json::to_string(&doc.metadata)?;
        conn.execute(
            r#"
            INSERT INTO source_documents (
                file_path, byte_len, fingerprint, status, created_at, modified_at, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(file_path) DO UPDATE SET
                byte_len = excluded.byte_len,
                fingerprint = excluded.fingerprint,
                status = excluded.status,
                modified_at = excluded.modified_at,
                metadata = excluded.metadata
            "#,
            params![
                doc.file_path,
                doc.byte_len as i64,
                doc.fingerprint,
                doc.status.as_str(),
                doc.created_at.to_rfc3339(),
                doc.modified_at.to_rfc3339(),
                metadata_json,
            ],
        )
        .map_err(|e| Error::metadata_write(format!("Failed to upsert source document: {}", e)))?;

        Ok(())
    }

    /// Get a source document by file path
    pub fn get_source(&self, file_path: &str) -> Result<Option<SourceDocument>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM source_documents WHERE file_path = ?1")
            .map_err(|e| Error::internal(format!("Failed to prepare query: {}", e)))?;

        let doc = stmt
            .query_row(params![file_path], row_to_source)
            .optional()
            .map_err(|e| Error::internal(format!("Failed to get source document: {}", e)))?;

        Ok(doc)
    }

    /// List all source documents, most recently modified first
    pub fn list_sources(&self) -> Result<Vec<SourceDocument>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM source_documents ORDER BY modified_at DESC")
            .map_err(|e| Error::internal(format!("Failed to prepare query: {}", e)))?;

        let docs = stmt
            .query_map([], row_to_source)
            .map_err(|e| Error::internal(format!("Failed to list source documents: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(docs)
    }

    /// List source documents in a given status
    pub fn list_by_status(&self, status: DocumentStatus) -> Result<Vec<SourceDocument>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM source_documents WHERE status = ?1 ORDER BY modified_at ASC")
            .map_err(|e| Error::internal(format!("Failed to prepare query: {}", e)))?;

        let docs = stmt
            .query_map(params![status.as_str()], row_to_source)
            .map_err(|e| Error::internal(format!("Failed to list source documents: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(docs)
    }

    /// Update the indexing status of a document
    pub fn set_status(&self, file_path: &str, status: DocumentStatus) -> Result<()> {
        let conn = self.conn.lock();

        let count = conn
            .execute(
                "UPDATE source_documents SET status = ?2 WHERE file_path = ?1",
                params![file_path, status.as_str()],
            )
            .map_err(|e| Error::metadata_write(format!("Failed to update status: {}", e)))?;

        if count == 0 {
            return Err(Error::NotFound(file_path.to_string()));
        }
        Ok(())
    }

    /// Delete a source document; chunk rows cascade
    pub fn delete_source(&self, file_path: &str) -> Result<bool> {
        let conn = self.conn.lock();

        let count = conn
            .execute(
                "DELETE FROM source_documents WHERE file_path = ?1",
                params![file_path],
            )
            .map_err(|e| Error::metadata_write(format!("Failed to delete source document: {}", e)))?;

        Ok(count > 0)
    }

    // ==================== Chunk operations ====================

    /// Replace all chunk rows for a source document in a single transaction.
    ///
    /// Rows are written `pending_index` until the vector write is confirmed.
    /// On any failure the transaction rolls back and nothing is visible.
    pub fn replace_chunks(&self, file_path: &str, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.conn.lock();

        let tx = conn
            .transaction()
            .map_err(|e| Error::metadata_write(format!("Failed to begin transaction: {}", e)))?;

        {
            tx.execute("DELETE FROM chunks WHERE file_path = ?1", params![file_path])
                .map_err(|e| Error::metadata_write(format!("Failed to clear old chunks: {}", e)))?;

            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO chunks (
                        id, file_path, ordinal, page_number, split_start,
                        content, metadata, pending_index, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
                    "#,
                )
                .map_err(|e| Error::metadata_write(format!("Failed to prepare insert: {}", e)))?;

            let now = Utc::now().to_rfc3339();
            for chunk in chunks {
                let metadata_json = serde_json::to_string(&chunk.metadata)?;
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.file_path,
                    chunk.ordinal as i64,
                    chunk.page_number.map(|p| p as i64),
                    chunk.split_start as i64,
                    chunk.content,
                    metadata_json,
                    &now,
                ])
                .map_err(|e| Error::metadata_write(format!("Failed to insert chunk: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| Error::metadata_write(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    /// Clear the pending flag for all chunks of a document
    pub fn mark_indexed(&self, file_path: &str) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE chunks SET pending_index = 0 WHERE file_path = ?1",
            params![file_path],
        )
        .map_err(|e| Error::metadata_write(format!("Failed to mark chunks indexed: {}", e)))?;

        Ok(())
    }

    /// True when the document has chunk rows awaiting a vector write
    pub fn has_pending(&self, file_path: &str) -> Result<bool> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE file_path = ?1 AND pending_index = 1",
                params![file_path],
                |row| row.get(0),
            )
            .map_err(|e| Error::internal(format!("Failed to count pending chunks: {}", e)))?;

        Ok(count > 0)
    }

    /// All chunks for a document, ordered by ordinal
    pub fn chunks_for(&self, file_path: &str) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM chunks WHERE file_path = ?1 ORDER BY ordinal ASC")
            .map_err(|e| Error::internal(format!("Failed to prepare query: {}", e)))?;

        let chunks = stmt
            .query_map(params![file_path], row_to_chunk)
            .map_err(|e| Error::internal(format!("Failed to list chunks: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(chunks)
    }

    /// Chunk ids currently recorded for a document
    pub fn chunk_ids_for(&self, file_path: &str) -> Result<Vec<ChunkId>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT id FROM chunks WHERE file_path = ?1 ORDER BY ordinal ASC")
            .map_err(|e| Error::internal(format!("Failed to prepare query: {}", e)))?;

        let ids = stmt
            .query_map(params![file_path], |row| {
                let id: String = row.get(0)?;
                Ok(id)
            })
            .map_err(|e| Error::internal(format!("Failed to list chunk ids: {}", e)))?
            .filter_map(|r| r.ok())
            .filter_map(|s| ChunkId::parse(&s))
            .collect();

        Ok(ids)
    }

    /// Fetch chunk rows by id; ids with no row are simply absent from the result
    pub fn get_chunks_by_ids(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT * FROM chunks WHERE id IN ({})", placeholders);

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::internal(format!("Failed to prepare query: {}", e)))?;

        let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let chunks = stmt
            .query_map(rusqlite::params_from_iter(id_strings.iter()), row_to_chunk)
            .map_err(|e| Error::internal(format!("Failed to fetch chunks: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(chunks)
    }

    /// Number of chunks recorded for a document
    pub fn count_chunks_for(&self, file_path: &str) -> Result<usize> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE file_path = ?1",
                params![file_path],
                |row| row.get(0),
            )
            .map_err(|e| Error::internal(format!("Failed to count chunks: {}", e)))?;

        Ok(count as usize)
    }

    /// Delete all chunk rows for a document
    pub fn delete_chunks_for(&self, file_path: &str) -> Result<usize> {
        let conn = self.conn.lock();

        let deleted = conn
            .execute("DELETE FROM chunks WHERE file_path = ?1", params![file_path])
            .map_err(|e| Error::metadata_write(format!("Failed to delete chunks: {}", e)))?;

        Ok(deleted)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<SourceDocument> {
    let file_path: String = row.get(0)?;
    let byte_len: i64 = row.get(1)?;
    let fingerprint: String = row.get(2)?;
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let modified_at: String = row.get(5)?;
    let metadata_json: Option<String> = row.get(6)?;

    Ok(SourceDocument {
        file_path,
        byte_len: byte_len as u64,
        fingerprint,
        status: DocumentStatus::parse(&status),
        created_at: parse_timestamp(&created_at),
        modified_at: parse_timestamp(&modified_at),
        metadata: metadata_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_else(Map::new),
    })
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let id: String = row.get(0)?;
    let file_path: String = row.get(1)?;
    let ordinal: i64 = row.get(2)?;
    let page_number: Option<i64> = row.get(3)?;
    let split_start: i64 = row.get(4)?;
    let content: String = row.get(5)?;
    let metadata_json: Option<String> = row.get(6)?;

    Ok(Chunk {
        id: ChunkId::parse(&id).unwrap_or_else(|| ChunkId::derive(&file_path, ordinal as u32)),
        file_path,
        ordinal: ordinal as u32,
        page_number: page_number.map(|p| p as u32),
        split_start: split_start as usize,
        content,
        metadata: metadata_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_else(Map::new),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn sample_source(path: &str) -> SourceDocument {
        let now = Utc::now();
        SourceDocument {
            file_path: path.to_string(),
            byte_len: 42,
            fingerprint: SourceDocument::fingerprint_of(b"content"),
            status: DocumentStatus::Clean,
            created_at: now,
            modified_at: now,
            metadata: Map::new(),
        }
    }

    fn sample_chunks(path: &str, count: u32) -> Vec<Chunk> {
        (0..count)
            .map(|i| Chunk::new(path, i, (i as usize) * 220, format!("chunk {}", i), Map::new()))
            .collect()
    }

    #[test]
    fn upsert_and_get_source() {
        let store = MetadataStore::in_memory().unwrap();
        store.upsert_source(&sample_source("uploads/a.txt")).unwrap();

        let doc = store.get_source("uploads/a.txt").unwrap().unwrap();
        assert_eq!(doc.file_path, "uploads/a.txt");
        assert_eq!(doc.status, DocumentStatus::Clean);

        assert!(store.get_source("uploads/missing.txt").unwrap().is_none());
    }

    #[test]
    fn replace_chunks_is_transactional_and_pending() {
        let store = MetadataStore::in_memory().unwrap();
        store.upsert_source(&sample_source("uploads/a.txt")).unwrap();

        store
            .replace_chunks("uploads/a.txt", &sample_chunks("uploads/a.txt", 3))
            .unwrap();

        assert_eq!(store.count_chunks_for("uploads/a.txt").unwrap(), 3);
        assert!(store.has_pending("uploads/a.txt").unwrap());

        store.mark_indexed("uploads/a.txt").unwrap();
        assert!(!store.has_pending("uploads/a.txt").unwrap());

        // replacing again does not duplicate rows
        store
            .replace_chunks("uploads/a.txt", &sample_chunks("uploads/a.txt", 2))
            .unwrap();
        assert_eq!(store.count_chunks_for("uploads/a.txt").unwrap(), 2);
    }

    #[test]
    fn chunks_require_live_source() {
        let store = MetadataStore::in_memory().unwrap();
        let result = store.replace_chunks("uploads/ghost.txt", &sample_chunks("uploads/ghost.txt", 1));
        assert!(matches!(result, Err(Error::MetadataWriteFailed(_))));
    }

    #[test]
    fn delete_source_cascades_to_chunks() {
        let store = MetadataStore::in_memory().unwrap();
        store.upsert_source(&sample_source("uploads/a.txt")).unwrap();
        store
            .replace_chunks("uploads/a.txt", &sample_chunks("uploads/a.txt", 3))
            .unwrap();

        assert!(store.delete_source("uploads/a.txt").unwrap());
        assert_eq!(store.count_chunks_for("uploads/a.txt").unwrap(), 0);
        assert!(store.get_source("uploads/a.txt").unwrap().is_none());
    }

    #[test]
    fn get_chunks_by_ids_skips_missing() {
        let store = MetadataStore::in_memory().unwrap();
        store.upsert_source(&sample_source("uploads/a.txt")).unwrap();
        let chunks = sample_chunks("uploads/a.txt", 2);
        store.replace_chunks("uploads/a.txt", &chunks).unwrap();

        let ghost = ChunkId::derive("uploads/other.txt", 9);
        let found = store
            .get_chunks_by_ids(&[chunks[0].id, ghost, chunks[1].id])
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn status_roundtrip() {
        let store = MetadataStore::in_memory().unwrap();
        store.upsert_source(&sample_source("uploads/a.txt")).unwrap();

        store.set_status("uploads/a.txt", DocumentStatus::Dirty).unwrap();
        let doc = store.get_source("uploads/a.txt").unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Dirty);

        assert!(matches!(
            store.set_status("uploads/missing.txt", DocumentStatus::Dirty),
            Err(Error::NotFound(_))
        ));
    }
}
