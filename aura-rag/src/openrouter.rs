//! OpenRouter embedding provider using an OpenAI-compatible embeddings API.
//!
//! This module is only available when the `openrouter` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default embeddings endpoint.
pub const OPENROUTER_EMBEDDINGS_URL: &str = "https://openrouter.ai/api/v1/embeddings";

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";

/// The default embedding model.
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// The dimensionality of `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const PROVIDER: &str = "OpenRouter";

/// An [`EmbeddingProvider`] backed by OpenRouter's `/embeddings` endpoint.
///
/// Any OpenAI-compatible endpoint works via [`with_base_url`](Self::with_base_url).
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – defaults to 1536; must match the model.
/// - `api_key` – from the constructor or the `OPENROUTER_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use aura_rag::openrouter::OpenRouterEmbeddingProvider;
///
/// let provider = OpenRouterEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("chest pain when climbing stairs").await?;
/// ```
pub struct OpenRouterEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dimensions: usize,
}

impl OpenRouterEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the key is empty or the HTTP
    /// client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::Configuration(format!("{PROVIDER} API key must not be empty")));
        }

        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build().map_err(|e| {
            RagError::Configuration(format!("failed to build {PROVIDER} HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            api_key,
            url: OPENROUTER_EMBEDDINGS_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Create a new provider using the `OPENROUTER_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(ENV_API_KEY).map_err(|_| {
            RagError::Configuration(format!("{ENV_API_KEY} environment variable not set"))
        })?;
        Self::new(api_key)
    }

    /// Point the provider at another OpenAI-compatible embeddings endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the dimensionality the model returns.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// The endpoint requests are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenRouterEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), model = %self.model, "embedding text");

        let request_body = EmbeddingRequest { model: &self.model, input: text };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::provider(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::provider(PROVIDER, format!("API returned {status}: {detail}")));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::provider(PROVIDER, "API returned no embedding"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_a_configuration_error() {
        let err = OpenRouterEmbeddingProvider::new("  ").err().unwrap();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn defaults_and_overrides() {
        let provider = OpenRouterEmbeddingProvider::new("sk-test").unwrap();
        assert_eq!(provider.url(), OPENROUTER_EMBEDDINGS_URL);
        assert_eq!(provider.model(), "text-embedding-3-small");
        assert_eq!(provider.dimensions(), 1536);
        assert_eq!(provider.name(), "OpenRouter");

        let provider = provider
            .with_base_url("http://localhost:8080/v1/embeddings")
            .with_model("nomic-embed-text")
            .with_dimensions(768);
        assert_eq!(provider.url(), "http://localhost:8080/v1/embeddings");
        assert_eq!(provider.model(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_provider_error() {
        let provider = OpenRouterEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_base_url("http://127.0.0.1:1/v1/embeddings");
        let err = provider.embed("cough").await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
