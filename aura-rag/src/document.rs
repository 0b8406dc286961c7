//! Data types for documents, chunks, and retrieval results.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The kind of knowledge a document carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Clinical or care guidelines.
    Guideline,
    /// Research papers and study summaries.
    Research,
    /// Patient or case records.
    Record,
    /// Anything else, including Q&A datasets.
    #[default]
    General,
}

impl DocumentType {
    /// The lowercase name used in metadata and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guideline => "guideline",
            Self::Research => "research",
            Self::Record => "record",
            Self::General => "general",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "guideline" => Ok(Self::Guideline),
            "research" => Ok(Self::Research),
            "record" => Ok(Self::Record),
            "general" => Ok(Self::General),
            other => Err(RagError::Validation(format!("unknown document type '{other}'"))),
        }
    }
}

/// Metadata describing where a chunk came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Name of the origin document.
    pub source: String,
    /// Page number within the origin document, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Section label; the chunker sets this to `chunk_{index}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// The kind of knowledge in the document.
    #[serde(default)]
    pub document_type: DocumentType,
    /// When the origin document was produced or loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChunkMetadata {
    /// Metadata for `source` with the given type and no optional fields.
    pub fn new(source: impl Into<String>, document_type: DocumentType) -> Self {
        Self { source: source.into(), page: None, section: None, document_type, timestamp: None }
    }
}

/// A retrievable segment of a source document.
///
/// Chunks are immutable once embedded; the vector store shares them behind
/// an [`Arc`] so results never copy chunk text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// `{source}_chunk_{index}`, unique within its source document.
    pub id: String,
    /// Chunk text, non-empty after trimming.
    pub content: String,
    /// Metadata inherited from the source document.
    pub metadata: ChunkMetadata,
    /// The vector embedding, absent until the chunk is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A document awaiting chunking and indexing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    /// Raw document text.
    pub content: String,
    /// Metadata copied onto every chunk.
    pub metadata: ChunkMetadata,
}

impl SourceDocument {
    /// Create a new source document.
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self { content: content.into(), metadata }
    }

    /// Check that the document has content and a named source.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for blank content or a blank source.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.source.trim().is_empty() {
            return Err(RagError::Validation("document metadata must name a source".into()));
        }
        if self.content.trim().is_empty() {
            return Err(RagError::Validation(format!(
                "document '{}' has no content",
                self.metadata.source
            )));
        }
        Ok(())
    }
}

/// A stored [`DocumentChunk`] paired with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The matched chunk, shared with the vector store.
    pub chunk: Arc<DocumentChunk>,
    /// Cosine similarity for raw search results. After recency fusion this
    /// is the weighted score and may exceed 1.0.
    pub similarity: f32,
    /// 1-based position within the result set it belongs to.
    pub rank: usize,
}

/// Restricts search candidates before scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    /// Only consider chunks of this type.
    pub document_type: Option<DocumentType>,
    /// Only consider chunks from this source.
    pub source: Option<String>,
}

impl SearchFilters {
    /// Whether no restriction is set.
    pub fn is_empty(&self) -> bool {
        self.document_type.is_none() && self.source.is_none()
    }

    /// Whether a chunk with this metadata passes every set restriction.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(document_type) = self.document_type {
            if metadata.document_type != document_type {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if &metadata.source != source {
                return false;
            }
        }
        true
    }
}

/// The result of one retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagContext {
    /// The user's original text.
    pub query: String,
    /// The text that was actually embedded, when retrieval got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reformulated_query: Option<String>,
    /// Matches ordered by descending similarity.
    pub retrieved_docs: Vec<RetrievalResult>,
    /// When the retrieval happened.
    pub timestamp: DateTime<Utc>,
}

impl RagContext {
    /// A context with results, stamped now.
    pub fn new(
        query: impl Into<String>,
        reformulated_query: Option<String>,
        retrieved_docs: Vec<RetrievalResult>,
    ) -> Self {
        Self { query: query.into(), reformulated_query, retrieved_docs, timestamp: Utc::now() }
    }

    /// A context with no results and no reformulation, stamped now.
    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, None, Vec::new())
    }
}
