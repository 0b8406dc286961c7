//! Document chunking.
//!
//! Documents are split on blank lines into paragraphs, and paragraphs are
//! packed into chunks of roughly `chunk_size` characters. A paragraph is
//! never split, so the size is a soft target: a paragraph longer than
//! `chunk_size` becomes an oversized chunk of its own. Consecutive chunks
//! share the trailing `chunk_overlap` characters of the earlier one.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::RagConfig;
use crate::document::{ChunkMetadata, DocumentChunk, SourceDocument};

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\s*\n").expect("unreachable error: failed to compile paragraph break pattern")
});

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`DocumentChunk`]s without embeddings; the
/// vector store attaches them on insertion.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in document order.
    fn chunk(&self, document: &SourceDocument) -> Vec<DocumentChunk>;
}

/// Packs whole paragraphs into chunks with a character overlap.
///
/// # Example
///
/// ```rust,ignore
/// use aura_rag::ParagraphChunker;
///
/// let chunker = ParagraphChunker::new(500, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ParagraphChunker {
    /// Create a new `ParagraphChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - target number of characters per chunk
    /// * `chunk_overlap` - number of trailing characters repeated in the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Use the chunk size and overlap from a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, document: &SourceDocument) -> Vec<DocumentChunk> {
        chunk_document(&document.content, &document.metadata, self.chunk_size, self.chunk_overlap)
    }
}

/// Split `content` into chunks carrying `metadata`.
///
/// Chunk IDs are `{source}_chunk_{index}` and each chunk's section is
/// `chunk_{index}`, counting emitted chunks from zero. Lengths are measured
/// in characters. The fit check compares the buffer and the next paragraph
/// without the blank line joining them, so a chunk of fitting paragraphs can
/// run two characters past `chunk_size`. Returns an empty `Vec` when
/// `content` has no non-blank paragraph.
pub fn chunk_document(
    content: &str,
    metadata: &ChunkMetadata,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for paragraph in PARAGRAPH_BREAK.split(content).filter(|p| !p.trim().is_empty()) {
        let paragraph_len = paragraph.chars().count();

        if !buffer.is_empty() && buffer_len + paragraph_len > chunk_size {
            let overlap = tail_chars(&buffer, chunk_overlap).to_string();
            push_chunk(&mut chunks, &buffer, metadata);
            buffer = format!("{overlap}{PARAGRAPH_SEPARATOR}{paragraph}");
        } else {
            if !buffer.is_empty() {
                buffer.push_str(PARAGRAPH_SEPARATOR);
            }
            buffer.push_str(paragraph);
        }
        buffer_len = buffer.chars().count();
    }

    if !buffer.trim().is_empty() {
        push_chunk(&mut chunks, &buffer, metadata);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<DocumentChunk>, text: &str, metadata: &ChunkMetadata) {
    let index = chunks.len();
    let mut metadata = metadata.clone();
    metadata.section = Some(format!("chunk_{index}"));
    chunks.push(DocumentChunk {
        id: format!("{}_chunk_{index}", metadata.source),
        content: text.trim().to_string(),
        metadata,
        embedding: None,
    });
}

/// The last `count` characters of `text` (all of it if shorter).
fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;

    fn metadata() -> ChunkMetadata {
        ChunkMetadata::new("diabetes.md", DocumentType::Guideline)
    }

    fn paragraph(seed: char, len: usize) -> String {
        std::iter::repeat_n(seed, len).collect()
    }

    #[test]
    fn short_paragraphs_share_one_chunk() {
        let first = paragraph('a', 200);
        let second = paragraph('b', 200);
        let content = format!("{first}\n\n{second}");

        let chunks = chunk_document(&content, &metadata(), 500, 50);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, content);
        assert_eq!(chunks[0].id, "diabetes.md_chunk_0");
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("chunk_0"));
        assert!(chunks[0].embedding.is_none());
    }

    #[test]
    fn exact_fit_ignores_the_separator() {
        let first = paragraph('a', 250);
        let second = paragraph('b', 250);
        let content = format!("{first}\n\n{second}");

        let chunks = chunk_document(&content, &metadata(), 500, 50);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.chars().count(), 502);

        let over = format!("{first}\n\n{}", paragraph('b', 251));
        assert_eq!(chunk_document(&over, &metadata(), 500, 50).len(), 2);
    }

    #[test]
    fn overflow_starts_next_chunk_with_overlap() {
        let first = paragraph('a', 290) + &paragraph('x', 10);
        let second = paragraph('b', 300);
        let content = format!("{first}\n\n{second}");

        let chunks = chunk_document(&content, &metadata(), 500, 50);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, first);
        let expected_overlap = &first[first.len() - 50..];
        assert!(chunks[1].content.starts_with(expected_overlap));
        assert!(chunks[1].content.ends_with(&second));
        assert_eq!(chunks[1].id, "diabetes.md_chunk_1");
        assert_eq!(chunks[1].metadata.section.as_deref(), Some("chunk_1"));
    }

    #[test]
    fn oversized_paragraph_is_not_split() {
        let long = paragraph('z', 1200);
        let chunks = chunk_document(&long, &metadata(), 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.len(), 1200);
    }

    #[test]
    fn blank_paragraphs_are_ignored() {
        let content = "\n\n   \n\nFever is common.\n \n\n\t\n";
        let chunks = chunk_document(content, &metadata(), 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Fever is common.");

        assert!(chunk_document("  \n\n ", &metadata(), 500, 50).is_empty());
    }

    #[test]
    fn overlap_counts_characters_not_bytes() {
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn chunker_trait_uses_configured_sizes() {
        let document = SourceDocument::new(
            format!("{}\n\n{}", paragraph('a', 60), paragraph('b', 60)),
            metadata(),
        );
        assert_eq!(ParagraphChunker::new(100, 10).chunk(&document).len(), 2);
        assert_eq!(ParagraphChunker::default().chunk(&document).len(), 1);
    }
}
