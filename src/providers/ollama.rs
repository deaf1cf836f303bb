//! Ollama-backed embedding and generation providers

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::error::{Error, Result};
use crate::types::document::Embedding;

use super::embedding::EmbeddingProvider;
use super::generation::GenerationProvider;

/// HTTP client for a local Ollama server
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    embed_model: String,
    embed_dimensions: usize,
    generate_model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// Create a client from the embedding and generation configuration
    pub fn new(embedding: &EmbeddingConfig, generation: &GenerationConfig) -> Result<Self> {
        let timeout = embedding.timeout_secs.max(generation.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: generation.base_url.trim_end_matches('/').to_string(),
            embed_model: embedding.model.clone(),
            embed_dimensions: embedding.dimensions,
            generate_model: generation.default_model.clone(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
        })
    }

    async fn check_tags(&self) -> Result<bool> {
        let resp = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let resp = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&json!({
                "model": self.embed_model,
                "prompt": text,
            }))
            .send()
            .await
            .map_err(|e| Error::embedding(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::embedding(format!(
                "server returned {} for model '{}'",
                resp.status(),
                self.embed_model
            )));
        }

        let body: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| Error::embedding(format!("malformed response: {}", e)))?;

        if body.embedding.len() != self.embed_dimensions {
            return Err(Error::embedding(format!(
                "model '{}' returned {} dimensions, expected {}",
                self.embed_model,
                body.embedding.len(),
                self.embed_dimensions
            )));
        }

        Ok(Embedding::dense(body.embedding))
    }

    fn dimensions(&self) -> usize {
        self.embed_dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.check_tags().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[async_trait]
impl GenerationProvider for OllamaClient {
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let model = model.unwrap_or(&self.generate_model);

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({
                "model": model,
                "prompt": prompt,
                "stream": false,
                "options": {
                    "temperature": self.temperature,
                    "num_predict": self.max_tokens,
                },
            }))
            .send()
            .await
            .map_err(|e| Error::GenerationFailed(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::GenerationFailed(format!(
                "server returned {} for model '{}'",
                resp.status(),
                model
            )));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| Error::GenerationFailed(format!("malformed response: {}", e)))?;

        Ok(body.response)
    }

    async fn health_check(&self) -> Result<bool> {
        self.check_tags().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.generate_model
    }
}
