//! Configuration for the wrag services
//!
//! Loaded from a `config.toml` searched in standard locations, with every
//! section carrying serde defaults so a missing file still yields a runnable
//! local setup. `validate()` rejects values the core invariants depend on.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage paths (relational DB and uploaded files)
    #[serde(default)]
    pub storage: StorageConfig,
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Generation (LLM) configuration
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    /// Index everything found under the storage root at boot
    #[serde(default = "default_index_on_startup")]
    pub index_on_startup: bool,
    /// Files processed concurrently during indexing (defaults to CPU count)
    #[serde(default)]
    pub parallel_files: Option<usize>,
}

fn default_index_on_startup() -> bool {
    true
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            generation: GenerationConfig::default(),
            vector_store: VectorStoreConfig::default(),
            index_on_startup: true,
            parallel_files: None,
        }
    }
}

impl RagConfig {
    /// Load configuration from an explicit path, or the first `config.toml`
    /// found in the standard locations; defaults when none exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::find_config_file(),
        };

        let config = match file {
            Some(p) => {
                let raw = std::fs::read_to_string(&p)?;
                let config: RagConfig = toml::from_str(&raw)
                    .map_err(|e| Error::invalid_configuration(format!("{}: {}", p.display(), e)))?;
                tracing::info!("Loaded configuration from {}", p.display());
                config
            }
            None => {
                tracing::warn!("No config.toml found, using default configuration");
                RagConfig::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Search the working directory, /etc, and the user's home for a config file
    fn find_config_file() -> Option<PathBuf> {
        let mut locations = vec![PathBuf::from("config.toml")];
        locations.push(PathBuf::from("/etc/wrag/config.toml"));
        if let Some(home) = dirs::home_dir() {
            locations.push(home.join(".wrag").join("config.toml"));
        }
        locations.into_iter().find(|p| p.is_file())
    }

    /// Reject configurations the core invariants cannot hold under
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.embedding.dimensions == 0 {
            return Err(Error::invalid_configuration(
                "embedding.dimensions must be greater than 0",
            ));
        }
        if self.vector_store.collection_name.is_empty() {
            return Err(Error::invalid_configuration(
                "vector_store.collection_name must not be empty",
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,
    /// Root directory for uploaded files
    pub file_storage_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wrag");
        Self {
            db_path: data_dir.join("wrag.db"),
            file_storage_path: data_dir.join("files"),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name
    pub model: String,
    /// Embedding dimensions (must match the model)
    pub dimensions: usize,
    /// Provider base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "intfloat/multilingual-e5-base".to_string(),
            dimensions: 768,
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Unit the splitter counts when cutting chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitUnit {
    Word,
    Character,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// How to split documents
    pub split_unit: SplitUnit,
    /// Maximum units per chunk
    pub split_length: usize,
    /// Units shared with the previous chunk
    pub split_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            split_unit: SplitUnit::Word,
            split_length: 250,
            split_overlap: 30,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.split_length == 0 {
            return Err(Error::invalid_configuration(
                "chunking.split_length must be greater than 0",
            ));
        }
        if self.split_overlap >= self.split_length {
            return Err(Error::invalid_configuration(format!(
                "chunking.split_overlap ({}) must be less than split_length ({})",
                self.split_overlap, self.split_length
            )));
        }
        Ok(())
    }
}

/// Generation (LLM) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Provider base URL
    pub base_url: String,
    /// Default generation model
    pub default_model: String,
    /// Models a request may select via `model`
    pub available_models: Vec<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "deepseek-r1:7b".to_string(),
            available_models: vec!["deepseek-r1:1.5b".to_string(), "deepseek-r1:7b".to_string()],
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 120,
        }
    }
}

/// Vector store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Qdrant over HTTP
    #[default]
    Qdrant,
    /// In-process store, for tests and single-node setups
    Memory,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Backend to use
    pub backend: VectorBackend,
    /// Store base URL
    pub url: String,
    /// Collection holding the chunk vectors
    pub collection_name: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Bounded retries for vector writes
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            collection_name: "semantic_search".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        RagConfig::default().validate().unwrap();
    }

    #[test]
    fn overlap_must_be_less_than_length() {
        let mut config = RagConfig::default();
        config.chunking.split_length = 10;
        config.chunking.split_overlap = 10;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn zero_split_length_rejected() {
        let mut config = RagConfig::default();
        config.chunking.split_length = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn parses_partial_toml() {
        let raw = r#"
            index_on_startup = false

            [chunking]
            split_unit = "character"
            split_length = 1000
            split_overlap = 100
        "#;
        let config: RagConfig = toml::from_str(raw).unwrap();
        assert!(!config.index_on_startup);
        assert_eq!(config.chunking.split_unit, SplitUnit::Character);
        assert_eq!(config.chunking.split_length, 1000);
        // untouched sections fall back to defaults
        assert_eq!(config.server.port, 8080);
    }
}
