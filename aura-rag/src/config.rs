//! Configuration for retrieval and conversational context.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Environment variable that disables retrieval when set to `"false"`.
pub const ENV_ENABLED: &str = "RAG_ENABLED";
/// Environment variable overriding [`RagConfig::top_k`].
pub const ENV_TOP_K: &str = "RAG_TOP_K";
/// Environment variable overriding [`RagConfig::similarity_threshold`].
pub const ENV_SIMILARITY_THRESHOLD: &str = "RAG_SIMILARITY_THRESHOLD";

/// Configuration parameters for chunking, indexing, and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Whether retrieval runs at all.
    pub enabled: bool,
    /// Soft target for chunk size in characters.
    pub chunk_size: usize,
    /// Number of trailing characters carried into the next chunk.
    pub chunk_overlap: usize,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum cosine similarity for a result to be returned.
    pub similarity_threshold: f32,
    /// Maximum number of concurrent embedding calls during insertion.
    pub embedding_batch_size: usize,
    /// Upper bound on a single embedding call.
    pub embedding_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            similarity_threshold: 0.3,
            embedding_batch_size: 10,
            embedding_timeout: Duration::from_secs(10),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load the configuration from the process environment.
    ///
    /// Reads [`ENV_ENABLED`], [`ENV_TOP_K`], and [`ENV_SIMILARITY_THRESHOLD`]
    /// on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a variable is set but cannot be
    /// parsed, or if the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(enabled) = lookup(ENV_ENABLED) {
            builder = builder.enabled(enabled.trim() != "false");
        }
        if let Some(top_k) = lookup(ENV_TOP_K) {
            let top_k = top_k.trim().parse::<usize>().map_err(|e| {
                RagError::Configuration(format!("{ENV_TOP_K} must be an integer ('{top_k}'): {e}"))
            })?;
            builder = builder.top_k(top_k);
        }
        if let Some(threshold) = lookup(ENV_SIMILARITY_THRESHOLD) {
            let threshold = threshold.trim().parse::<f32>().map_err(|e| {
                RagError::Configuration(format!(
                    "{ENV_SIMILARITY_THRESHOLD} must be a number ('{threshold}'): {e}"
                ))
            })?;
            builder = builder.similarity_threshold(threshold);
        }

        builder.build()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Enable or disable retrieval.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the target chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set how many embedding calls may be outstanding during insertion.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the timeout applied to each embedding call.
    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding_timeout = timeout;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embedding_batch_size == 0`
    /// - `embedding_timeout` is zero
    /// - `similarity_threshold` is not finite
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".to_string()));
        }
        if config.embedding_batch_size == 0 {
            return Err(RagError::Configuration(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if config.embedding_timeout.is_zero() {
            return Err(RagError::Configuration("embedding_timeout must be non-zero".to_string()));
        }
        if !config.similarity_threshold.is_finite() {
            return Err(RagError::Configuration(format!(
                "similarity_threshold must be finite, got {}",
                config.similarity_threshold
            )));
        }
        Ok(config)
    }
}

/// Limits and timings for per-session conversational context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextConfig {
    /// Retrieval events kept per session; the oldest is evicted first.
    pub max_contexts: usize,
    /// Entities kept per session; the oldest is evicted first.
    pub max_entities: usize,
    /// Number of fused documents handed to the caller.
    pub fused_top_k: usize,
    /// Number of recent retrieval events the summary looks at.
    pub summary_window: usize,
    /// Idle time after which a session's context is considered stale.
    pub refresh_after: Duration,
    /// Idle time after which a session is dropped by cleanup.
    pub session_ttl: Duration,
    /// How often the background cleanup sweep runs.
    pub cleanup_interval: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_contexts: 10,
            max_entities: 20,
            fused_top_k: 5,
            summary_window: 3,
            refresh_after: Duration::from_secs(5 * 60),
            session_ttl: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(10 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_values() {
        let config = RagConfig::default();
        assert!(config.enabled);
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.similarity_threshold, 0.3);
        assert_eq!(config.embedding_batch_size, 10);
        assert!(RagConfig::builder().build().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn rejects_zero_top_k_and_batch_size() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().embedding_batch_size(0).build().is_err());
        assert!(RagConfig::builder().embedding_timeout(Duration::ZERO).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(f32::NAN).build().is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        let config = RagConfig::from_env_with(env(&[
            (ENV_ENABLED, "false"),
            (ENV_TOP_K, "8"),
            (ENV_SIMILARITY_THRESHOLD, "0.45"),
        ]))
        .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.top_k, 8);
        assert_eq!(config.similarity_threshold, 0.45);
    }

    #[test]
    fn empty_env_yields_defaults() {
        let config = RagConfig::from_env_with(env(&[])).unwrap();
        assert_eq!(config, RagConfig::default());
    }

    #[test]
    fn unparsable_env_is_a_configuration_error() {
        let err = RagConfig::from_env_with(env(&[(ENV_TOP_K, "five")])).unwrap_err();
        assert!(matches!(err, RagError::Configuration(msg) if msg.contains(ENV_TOP_K)));
    }

    #[test]
    fn context_defaults() {
        let config = ContextConfig::default();
        assert_eq!(config.max_contexts, 10);
        assert_eq!(config.max_entities, 20);
        assert_eq!(config.refresh_after, Duration::from_secs(300));
        assert_eq!(config.session_ttl, Duration::from_secs(1800));
    }
}
