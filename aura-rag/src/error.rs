//! Error types for the `aura-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval, indexing, and context operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid configuration, such as an absent API key.
    ///
    /// Fatal at startup and never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An embedding provider call failed (network, auth, quota, timeout,
    /// or a malformed response).
    #[error("Embedding provider error ({provider}): {message}")]
    Provider {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Two vectors of different lengths met in a similarity computation,
    /// or an embedding did not match the provider's dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality that was expected.
        expected: usize,
        /// The dimensionality that was found.
        actual: usize,
    },

    /// Malformed document or conversation input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A filesystem error while loading documents.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON decoding error while loading documents or history.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// Build a [`RagError::Provider`] from a provider name and message.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.into(), message: message.into() }
    }

    /// Whether retrieval can continue without augmentation after this error.
    ///
    /// Provider failures are expected at runtime; every other variant points
    /// at bad input or a broken invariant.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
