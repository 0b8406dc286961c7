//! # aura-rag
//!
//! Retrieval and conversational context for the AURA health assistant.
//!
//! ## Overview
//!
//! Documents are split into paragraph-aligned chunks, embedded, and kept in
//! an in-memory vector store. A query is expanded with recent dialogue,
//! embedded, and matched by cosine similarity. Each session keeps its recent
//! retrievals, which are fused with recency weighting into the bundle handed
//! to the language-model caller.
//!
//! - [`ParagraphChunker`] - splits documents on blank lines
//! - [`InMemoryVectorStore`] - batched embedding and filtered top-K search
//! - [`RecentTurnsReformulator`] - expands queries with the last turns
//! - [`Retriever`] - reformulate, embed, and search in one call
//! - [`ContextManager`] - per-session history, fusion, entities, and expiry
//! - [`RagService`] - ties the retriever and context manager together
//!
//! ## Features
//!
//! - `openrouter` (default) - [`OpenRouterEmbeddingProvider`](openrouter::OpenRouterEmbeddingProvider)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use aura_rag::{ContextManager, RagConfig, RagService, Retriever};
//! use aura_rag::openrouter::OpenRouterEmbeddingProvider;
//!
//! let retriever = Retriever::builder()
//!     .config(RagConfig::from_env()?)
//!     .embedding_provider(Arc::new(OpenRouterEmbeddingProvider::from_env()?))
//!     .build()?;
//! let service = RagService::new(Arc::new(retriever), Arc::new(ContextManager::new()));
//! let cleanup = service.start();
//! ```

pub mod chunking;
pub mod config;
pub mod context;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod inmemory;
pub mod reformulate;
pub mod retrieval;
pub mod service;
pub mod similarity;

#[cfg(feature = "openrouter")]
pub mod openrouter;

pub use chunking::{Chunker, ParagraphChunker, chunk_document};
pub use config::{ContextConfig, RagConfig, RagConfigBuilder};
pub use context::{CleanupTask, ContextManager, ConversationContext, RelevantContext};
pub use conversation::{ConversationMessage, Role, parse_history};
pub use document::{
    ChunkMetadata, DocumentChunk, DocumentType, RagContext, RetrievalResult, SearchFilters,
    SourceDocument,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use reformulate::{QueryReformulator, RecentTurnsReformulator};
pub use retrieval::{
    IndexReport, IndexState, RagStatus, RetrievalOptions, RetrievalOutcome, Retriever,
    RetrieverBuilder,
};
pub use service::RagService;
pub use similarity::cosine_similarity;
