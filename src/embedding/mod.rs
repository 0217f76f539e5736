//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and an OpenAI-compatible HTTP
//! implementation producing [`EMBEDDING_DIM`]-dimensional vectors. The
//! provider is created via [`create_provider`] from configuration.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

/// Number of dimensions in the embedding vectors (text-embedding-3-small).
pub const EMBEDDING_DIM: usize = 1536;

/// Trait for embedding text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
pub fn create_provider(
    config: &crate::config::OpenAiConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    anyhow::ensure!(
        !config.api_key.is_empty(),
        "OpenAI API key is not configured (set OPENAI_API_KEY)"
    );
    Ok(Box::new(openai::OpenAiEmbeddingProvider::new(config)?))
}
