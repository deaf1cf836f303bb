//! Query request types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_top_k() -> usize {
    5
}

/// A search request against the indexed corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The question or search phrase
    pub query: String,
    /// Optional metadata filters (matched against chunk metadata)
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
    /// Per-request generation model override
    #[serde(default)]
    pub model: Option<String>,
    /// Number of chunks to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Reassemble context in document order instead of score order
    #[serde(default)]
    pub document_order: bool,
}
