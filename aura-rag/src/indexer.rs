//! Loading knowledge into the vector store.
//!
//! Three sources are supported: a Q&A dataset in CSV form, a directory of
//! plain-text or markdown guidelines, and a JSONL export of chunks whose
//! embeddings were computed offline.

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::document::{ChunkMetadata, DocumentChunk, DocumentType, SourceDocument};
use crate::error::{RagError, Result};
use crate::retrieval::{IndexReport, Retriever};

/// Source name given to documents built from the Q&A dataset.
pub const QA_DATASET_SOURCE: &str = "healthcare_dataset.csv";

/// One question/answer row from the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    /// The question text.
    pub question: String,
    /// The answer text.
    pub answer: String,
    /// Optional category column.
    pub category: Option<String>,
}

impl QaPair {
    /// Turn the pair into a `general` document.
    pub fn into_document(self) -> SourceDocument {
        let mut metadata = ChunkMetadata::new(QA_DATASET_SOURCE, DocumentType::General);
        metadata.section = Some(self.category.unwrap_or_else(|| "general".to_string()));
        SourceDocument::new(
            format!("Question: {}\n\nAnswer: {}", self.question, self.answer),
            metadata,
        )
    }
}

/// Parse Q&A pairs from CSV text.
///
/// The header must contain a column whose name includes `question` and one
/// whose name includes `answer` (case-insensitive); a `category` column is
/// optional. Fields are split on commas without quoting. Rows too short to
/// hold both fields, and pairs with an empty question or answer, are skipped.
///
/// # Errors
///
/// Returns [`RagError::Validation`] if the header lacks either column.
pub fn parse_qa_csv(text: &str) -> Result<Vec<QaPair>> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<String> = lines
        .next()
        .map(|line| line.split(',').map(|h| h.trim().to_lowercase()).collect())
        .unwrap_or_default();

    let question_idx = header.iter().position(|h| h.contains("question"));
    let answer_idx = header.iter().position(|h| h.contains("answer"));
    let (Some(question_idx), Some(answer_idx)) = (question_idx, answer_idx) else {
        return Err(RagError::Validation(
            "CSV must contain 'question' and 'answer' columns".to_string(),
        ));
    };
    let category_idx = header.iter().position(|h| h == "category");

    let pairs = lines
        .filter_map(|line| {
            let values: Vec<&str> = line.split(',').collect();
            if values.len() <= question_idx.max(answer_idx) {
                return None;
            }
            let question = values[question_idx].trim();
            let answer = values[answer_idx].trim();
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            let category = category_idx
                .and_then(|idx| values.get(idx))
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            Some(QaPair { question: question.to_string(), answer: answer.to_string(), category })
        })
        .collect();

    Ok(pairs)
}

/// Read a Q&A CSV file into documents.
pub fn load_qa_dataset(path: impl AsRef<Path>) -> Result<Vec<SourceDocument>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_qa_csv(&text)?.into_iter().map(QaPair::into_document).collect())
}

/// Read every `.txt` and `.md` file in `dir` as a guideline document.
///
/// Files are returned in file-name order. Subdirectories are ignored.
pub fn load_guidelines(dir: impl AsRef<Path>) -> Result<Vec<SourceDocument>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_text = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e == "txt" || e == "md");
        if path.is_file() && is_text {
            paths.push(path);
        }
    }
    paths.sort();

    let loaded_at = Utc::now();
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let source = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        let mut metadata = ChunkMetadata::new(source, DocumentType::Guideline);
        metadata.timestamp = Some(loaded_at);
        documents.push(SourceDocument::new(content, metadata));
    }
    Ok(documents)
}

/// Read chunks with precomputed embeddings, one JSON object per line.
///
/// # Errors
///
/// Returns [`RagError::Json`] for a malformed line and
/// [`RagError::Validation`] for a chunk without an embedding.
pub fn load_precomputed_chunks(path: impl AsRef<Path>) -> Result<Vec<DocumentChunk>> {
    let text = fs::read_to_string(path)?;
    let mut chunks = Vec::new();
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let chunk: DocumentChunk = serde_json::from_str(line)?;
        if chunk.embedding.is_none() {
            return Err(RagError::Validation(format!("chunk '{}' has no embedding", chunk.id)));
        }
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Load a Q&A dataset and index it.
pub async fn index_qa_dataset(retriever: &Retriever, path: impl AsRef<Path>) -> Result<IndexReport> {
    let documents = load_qa_dataset(path)?;
    info!(pairs = documents.len(), "indexing Q&A dataset");
    retriever.index_documents(&documents).await
}

/// Load a guideline directory and index it.
///
/// An empty directory indexes nothing and reports zero documents.
pub async fn index_guidelines(retriever: &Retriever, dir: impl AsRef<Path>) -> Result<IndexReport> {
    let documents = load_guidelines(dir)?;
    if documents.is_empty() {
        warn!("no guideline files found");
        return Ok(IndexReport {
            documents: 0,
            chunks: 0,
            total_chunks: retriever.vector_store().len().await,
        });
    }
    info!(files = documents.len(), "indexing guidelines");
    retriever.index_documents(&documents).await
}

/// Load precomputed chunks straight into the retriever's store.
///
/// Returns the number of chunks inserted.
pub async fn load_precomputed_embeddings(
    retriever: &Retriever,
    path: impl AsRef<Path>,
) -> Result<usize> {
    let chunks = load_precomputed_chunks(path)?;
    retriever.vector_store().insert_embedded(chunks).await
}
