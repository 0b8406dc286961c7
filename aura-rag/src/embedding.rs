//! Embedding provider trait for generating vector embeddings from text.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that turns text into a fixed-length vector.
///
/// Every vector a provider returns must have [`dimensions`](Self::dimensions)
/// entries; the vector store rejects anything else.
///
/// # Example
///
/// ```rust,ignore
/// use aura_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("persistent dry cough").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Provider`](crate::RagError::Provider) on network,
    /// auth, quota, or response-format failures.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Call [`EmbeddingProvider::embed`], failing if it takes longer than `limit`.
///
/// A timeout is reported as a [`RagError::Provider`] so callers treat it
/// like any other provider failure.
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    text: &str,
    limit: Duration,
) -> Result<Vec<f32>> {
    match tokio::time::timeout(limit, provider.embed(text)).await {
        Ok(result) => result,
        Err(_) => Err(RagError::provider(
            provider.name(),
            format!("embedding call timed out after {}ms", limit.as_millis()),
        )),
    }
}
