//! Qdrant vector store over its HTTP API
//!
//! Chunk ids double as point ids, so upserts are naturally idempotent and a
//! re-sent batch converges. Deletes filter on the `file_path` payload field.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::VectorStoreConfig;
use crate::error::{Error, Result};
use crate::types::document::ChunkId;

use super::vector_store::{VectorHit, VectorPoint, VectorStoreProvider};

/// Qdrant-backed vector store
pub struct QdrantStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    id: Value,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantStore {
    /// Create a client for the configured collection
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection_name.clone(),
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.base_url, self.collection, suffix
        )
    }

    /// Create the collection if it does not exist yet
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        let resp = self.http.get(self.collection_url("")).send().await?;
        if resp.status().is_success() {
            return Ok(());
        }

        tracing::info!(
            "Creating vector collection '{}' ({} dimensions)",
            self.collection,
            dimensions
        );
        let resp = self
            .http
            .put(self.collection_url(""))
            .json(&json!({
                "vectors": { "size": dimensions, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::vector_write(format!(
                "failed to create collection '{}': {}",
                self.collection,
                resp.status()
            )));
        }
        Ok(())
    }

    fn source_filter(file_path: &str) -> Value {
        json!({
            "must": [
                { "key": "file_path", "match": { "value": file_path } }
            ]
        })
    }

    fn parse_id(raw: &Value) -> Option<ChunkId> {
        raw.as_str().and_then(ChunkId::parse)
    }
}

#[async_trait]
impl VectorStoreProvider for QdrantStore {
    async fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let body: Vec<Value> = points
            .iter()
            .map(|p| {
                json!({
                    "id": p.id.to_string(),
                    "vector": &p.dense,
                    "payload": { "file_path": &p.file_path },
                })
            })
            .collect();

        let resp = self
            .http
            .put(self.collection_url("/points?wait=true"))
            .json(&json!({ "points": body }))
            .send()
            .await
            .map_err(|e| Error::vector_write(format!("upsert request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::vector_write(format!(
                "upsert returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn delete_by_source(&self, file_path: &str) -> Result<usize> {
        let before = self.ids_for_source(file_path).await?.len();

        let resp = self
            .http
            .post(self.collection_url("/points/delete?wait=true"))
            .json(&json!({ "filter": Self::source_filter(file_path) }))
            .send()
            .await
            .map_err(|e| Error::vector_write(format!("delete request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::vector_write(format!(
                "delete returned {}",
                resp.status()
            )));
        }
        Ok(before)
    }

    async fn ids_for_source(&self, file_path: &str) -> Result<Vec<ChunkId>> {
        let mut ids = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "filter": Self::source_filter(file_path),
                "limit": 1000,
                "with_payload": false,
                "with_vector": false,
            });
            if let Some(ref o) = offset {
                body["offset"] = o.clone();
            }

            let resp = self
                .http
                .post(self.collection_url("/points/scroll"))
                .json(&body)
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(Error::internal(format!(
                    "scroll returned {}",
                    resp.status()
                )));
            }

            let page: QdrantResponse<ScrollResult> = resp.json().await?;
            ids.extend(page.result.points.iter().filter_map(|p| Self::parse_id(&p.id)));

            match page.result.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn search(&self, dense: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        let resp = self
            .http
            .post(self.collection_url("/points/search"))
            .json(&json!({
                "vector": dense,
                "limit": top_k,
                "with_payload": false,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::internal(format!(
                "search returned {}",
                resp.status()
            )));
        }

        let body: QdrantResponse<Vec<ScoredPoint>> = resp.json().await?;
        Ok(body
            .result
            .iter()
            .filter_map(|p| {
                Self::parse_id(&p.id).map(|id| VectorHit { id, score: p.score })
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let resp = self
            .http
            .post(self.collection_url("/points/count"))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::internal(format!("count returned {}", resp.status())));
        }

        let body: QdrantResponse<CountResult> = resp.json().await?;
        Ok(body.result.count)
    }

    async fn health_check(&self) -> Result<bool> {
        let resp = self
            .http
            .get(format!("{}/readyz", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
