//! Generation provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for LLM-backed answer generation
///
/// A local model server and a remote API are both driven through this one
/// contract; the backend and default model are selected by configuration,
/// with a per-request override.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate text for a fully built prompt
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Default model used when no override is given
    fn model(&self) -> &str;
}
