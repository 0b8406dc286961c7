//! Retrieval orchestrator.
//!
//! The [`Retriever`] composes a [`QueryReformulator`], the store's
//! [`EmbeddingProvider`], and an [`InMemoryVectorStore`] into one retrieval
//! call, and chunks and indexes documents on the way in.
//!
//! Retrieval never fails from the caller's point of view. Every problem is
//! folded into a [`RetrievalOutcome`] whose [`RagContext`] is simply empty,
//! so the downstream model call can go ahead without augmentation.
//!
//! # Example
//!
//! ```rust,ignore
//! use aura_rag::{RagConfig, Retriever, RetrievalOptions};
//!
//! let retriever = Retriever::builder()
//!     .config(RagConfig::from_env()?)
//!     .embedding_provider(Arc::new(OpenRouterEmbeddingProvider::from_env()?))
//!     .build()?;
//!
//! retriever.index_documents(&documents).await?;
//! let outcome = retriever
//!     .retrieve_context("What are the symptoms of diabetes?", &history, &RetrievalOptions::default())
//!     .await;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, ParagraphChunker};
use crate::config::RagConfig;
use crate::conversation::ConversationMessage;
use crate::document::{DocumentType, RagContext, SearchFilters, SourceDocument};
use crate::embedding::{EmbeddingProvider, embed_with_timeout};
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::reformulate::{QueryReformulator, RecentTurnsReformulator};

/// Per-call overrides for retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOptions {
    /// Overrides [`RagConfig::top_k`].
    pub top_k: Option<usize>,
    /// Overrides [`RagConfig::similarity_threshold`].
    pub threshold: Option<f32>,
    /// Only return chunks of this type.
    pub document_type: Option<DocumentType>,
    /// Only return chunks from this source.
    pub source: Option<String>,
}

impl RetrievalOptions {
    /// Return at most `k` results.
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Drop results scoring below `threshold`.
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Restrict results to one document type.
    pub fn document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = Some(document_type);
        self
    }

    /// Restrict results to one source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    fn filters(&self) -> SearchFilters {
        SearchFilters { document_type: self.document_type, source: self.source.clone() }
    }
}

/// What happened during a retrieval call.
///
/// Every variant carries a valid [`RagContext`]; only `Retrieved` can hold
/// documents. The variants tell "nothing matched" apart from "nothing was
/// searched".
#[derive(Debug)]
pub enum RetrievalOutcome {
    /// The store was searched. The context may still hold no documents if
    /// none cleared the threshold.
    Retrieved(RagContext),
    /// The store holds no chunks, so no provider call was made.
    EmptyStore(RagContext),
    /// Retrieval is switched off in the configuration.
    Disabled(RagContext),
    /// Reformulation, embedding, or search failed.
    Degraded {
        /// An empty context carrying the original query.
        context: RagContext,
        /// Why retrieval failed.
        reason: RagError,
    },
}

impl RetrievalOutcome {
    /// The retrieval context, whatever the outcome.
    pub fn context(&self) -> &RagContext {
        match self {
            Self::Retrieved(context) | Self::EmptyStore(context) | Self::Disabled(context) => {
                context
            }
            Self::Degraded { context, .. } => context,
        }
    }

    /// Consume the outcome, keeping only the retrieval context.
    pub fn into_context(self) -> RagContext {
        match self {
            Self::Retrieved(context) | Self::EmptyStore(context) | Self::Disabled(context) => {
                context
            }
            Self::Degraded { context, .. } => context,
        }
    }

    /// Whether retrieval failed and fell back to an empty context.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Summary of an indexing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// Documents indexed by this call.
    pub documents: usize,
    /// Chunks added by this call.
    pub chunks: usize,
    /// Chunks in the store afterwards.
    pub total_chunks: usize,
}

/// Whether the store has anything to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// At least one chunk is indexed.
    Active,
    /// Nothing is indexed yet.
    Empty,
}

/// Read-only snapshot of retrieval state for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagStatus {
    /// Whether retrieval is enabled.
    pub enabled: bool,
    /// Number of indexed chunks.
    pub document_count: usize,
    /// Derived from `document_count`.
    pub state: IndexState,
    /// Human-readable description of the state.
    pub message: String,
    /// Configured default result count.
    pub top_k: usize,
    /// Configured default similarity threshold.
    pub similarity_threshold: f32,
}

/// The retrieval orchestrator.
///
/// Construct one via [`Retriever::builder()`] and share it behind an `Arc`.
pub struct Retriever {
    config: RagConfig,
    vector_store: Arc<InMemoryVectorStore>,
    chunker: Arc<dyn Chunker>,
    reformulator: Arc<dyn QueryReformulator>,
}

impl Retriever {
    /// Create a new [`RetrieverBuilder`].
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<InMemoryVectorStore> {
        &self.vector_store
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        self.vector_store.provider()
    }

    /// Find chunks relevant to `query` given the conversation so far.
    ///
    /// Short-circuits without reformulating or embedding when retrieval is
    /// disabled or the store is empty. Otherwise reformulates the query,
    /// embeds it under the configured timeout, and searches with the
    /// options' top-K, threshold, and filters, falling back to the
    /// configured defaults.
    pub async fn retrieve_context(
        &self,
        query: &str,
        history: &[ConversationMessage],
        options: &RetrievalOptions,
    ) -> RetrievalOutcome {
        if !self.config.enabled {
            debug!("retrieval disabled; skipping");
            return RetrievalOutcome::Disabled(RagContext::empty(query));
        }
        if self.vector_store.is_empty().await {
            info!("vector store is empty; no documents indexed yet");
            return RetrievalOutcome::EmptyStore(RagContext::empty(query));
        }

        match self.search(query, history, options).await {
            Ok(context) => RetrievalOutcome::Retrieved(context),
            Err(reason) => {
                if reason.is_recoverable() {
                    warn!(error = %reason, "retrieval failed; continuing without context");
                } else {
                    error!(error = %reason, "retrieval failed; continuing without context");
                }
                RetrievalOutcome::Degraded { context: RagContext::empty(query), reason }
            }
        }
    }

    async fn search(
        &self,
        query: &str,
        history: &[ConversationMessage],
        options: &RetrievalOptions,
    ) -> Result<RagContext> {
        let reformulated = self.reformulator.reformulate(query, history)?;
        debug!(reformulated = %reformulated, "reformulated query");

        let query_embedding = embed_with_timeout(
            self.embedding_provider().as_ref(),
            &reformulated,
            self.config.embedding_timeout,
        )
        .await?;

        let filters = options.filters();
        let results = self
            .vector_store
            .search(
                &query_embedding,
                options.top_k.unwrap_or(self.config.top_k),
                options.threshold.unwrap_or(self.config.similarity_threshold),
                (!filters.is_empty()).then_some(&filters),
            )
            .await?;

        info!(result_count = results.len(), "retrieved relevant documents");
        Ok(RagContext::new(query, Some(reformulated), results))
    }

    /// Chunk and index documents.
    ///
    /// Every document is validated before anything is chunked, so a
    /// malformed entry leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for a malformed document, or the
    /// error from [`InMemoryVectorStore::add_documents`].
    pub async fn index_documents(&self, documents: &[SourceDocument]) -> Result<IndexReport> {
        for document in documents {
            document.validate()?;
        }

        let chunks: Vec<_> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        let added = self.vector_store.add_documents(chunks).await.inspect_err(|e| {
            error!(documents = documents.len(), error = %e, "indexing failed");
        })?;

        let report = IndexReport {
            documents: documents.len(),
            chunks: added,
            total_chunks: self.vector_store.len().await,
        };
        info!(
            documents = report.documents,
            chunks = report.chunks,
            total_chunks = report.total_chunks,
            "indexed documents"
        );
        Ok(report)
    }

    /// Report the document count and retrieval defaults.
    pub async fn status(&self) -> RagStatus {
        let document_count = self.vector_store.len().await;
        let (state, message) = if document_count > 0 {
            (IndexState::Active, format!("RAG is active with {document_count} document chunks indexed"))
        } else {
            (IndexState::Empty, "RAG is enabled but no documents are indexed yet".to_string())
        };
        let message = if self.config.enabled { message } else { "RAG is disabled".to_string() };

        RagStatus {
            enabled: self.config.enabled,
            document_count,
            state,
            message,
            top_k: self.config.top_k,
            similarity_threshold: self.config.similarity_threshold,
        }
    }
}

/// Builder for constructing a [`Retriever`].
///
/// `config` and one of `vector_store` or `embedding_provider` are required.
/// Given only a provider, the builder creates an empty store for it. The
/// chunker defaults to a [`ParagraphChunker`] sized from the configuration
/// and the reformulator to [`RecentTurnsReformulator`].
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::builder()
///     .config(RagConfig::default())
///     .vector_store(Arc::new(store))
///     .reformulator(Arc::new(RecentTurnsReformulator::new(6)))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<InMemoryVectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reformulator: Option<Arc<dyn QueryReformulator>>,
}

impl RetrieverBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider for a store created by the builder.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Use an existing vector store.
    pub fn vector_store(mut self, store: Arc<InMemoryVectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the query reformulator.
    pub fn reformulator(mut self, reformulator: Arc<dyn QueryReformulator>) -> Self {
        self.reformulator = Some(reformulator);
        self
    }

    /// Build the [`Retriever`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `config` is missing, if neither
    /// a store nor a provider is set, or if both are set.
    pub fn build(self) -> Result<Retriever> {
        let config =
            self.config.ok_or_else(|| RagError::Configuration("config is required".to_string()))?;

        let vector_store = match (self.vector_store, self.embedding_provider) {
            (Some(store), None) => store,
            (None, Some(provider)) => Arc::new(InMemoryVectorStore::with_config(provider, &config)),
            (Some(_), Some(_)) => {
                return Err(RagError::Configuration(
                    "set either vector_store or embedding_provider, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(RagError::Configuration(
                    "vector_store or embedding_provider is required".to_string(),
                ));
            }
        };

        let chunker =
            self.chunker.unwrap_or_else(|| Arc::new(ParagraphChunker::from_config(&config)));
        let reformulator =
            self.reformulator.unwrap_or_else(|| Arc::new(RecentTurnsReformulator::default()));

        Ok(Retriever { config, vector_store, chunker, reformulator })
    }
}
