//! In-process vector store
//!
//! Backs tests and single-node setups that run without an external vector
//! database. Brute-force cosine search; fine at test scale.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::document::ChunkId;

use super::vector_store::{VectorHit, VectorPoint, VectorStoreProvider};

/// HashMap-backed vector store keyed by chunk id
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: RwLock<HashMap<ChunkId, VectorPoint>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn upsert(&self, batch: &[VectorPoint]) -> Result<()> {
        for point in batch {
            if point.dense.is_empty() {
                return Err(Error::vector_write(format!(
                    "point {} has an empty vector",
                    point.id
                )));
            }
        }
        let mut points = self.points.write();
        for point in batch {
            points.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn delete_by_source(&self, file_path: &str) -> Result<usize> {
        let mut points = self.points.write();
        let before = points.len();
        points.retain(|_, p| p.file_path != file_path);
        Ok(before - points.len())
    }

    async fn ids_for_source(&self, file_path: &str) -> Result<Vec<ChunkId>> {
        let points = self.points.read();
        let mut ids: Vec<ChunkId> = points
            .values()
            .filter(|p| p.file_path == file_path)
            .map(|p| p.id)
            .collect();
        ids.sort_by_key(|id| id.to_string());
        Ok(ids)
    }

    async fn search(&self, dense: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        let points = self.points.read();
        let mut hits: Vec<VectorHit> = points
            .values()
            .map(|p| VectorHit {
                id: p.id,
                score: cosine_similarity(dense, &p.dense),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.points.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(path: &str, ordinal: u32, dense: Vec<f32>) -> VectorPoint {
        VectorPoint {
            id: ChunkId::derive(path, ordinal),
            file_path: path.to_string(),
            dense,
            sparse: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = InMemoryVectorStore::new();
        let p = point("uploads/a.txt", 0, vec![1.0, 0.0]);

        store.upsert(&[p.clone()]).await.unwrap();
        store.upsert(&[p]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_by_source_removes_only_that_document() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                point("uploads/a.txt", 0, vec![1.0, 0.0]),
                point("uploads/a.txt", 1, vec![0.5, 0.5]),
                point("uploads/b.txt", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let deleted = store.delete_by_source("uploads/a.txt").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.ids_for_source("uploads/a.txt").await.unwrap().is_empty());
        assert_eq!(store.ids_for_source("uploads/b.txt").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_ranks_by_cosine() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                point("uploads/a.txt", 0, vec![1.0, 0.0]),
                point("uploads/a.txt", 1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, ChunkId::derive("uploads/a.txt", 0));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn empty_vector_rejected() {
        let store = InMemoryVectorStore::new();
        let result = store.upsert(&[point("uploads/a.txt", 0, vec![])]).await;
        assert!(matches!(result, Err(Error::VectorWriteFailed(_))));
    }
}
