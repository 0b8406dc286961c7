//! Test embedders shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use aura_rag::{
    ChunkMetadata, DocumentType, EmbeddingProvider, RagConfig, RagError, Result, Retriever,
    SourceDocument,
};

/// Vocabulary each [`KeywordEmbedder`] dimension counts.
pub const KEYWORDS: &[&str] = &["diabetes", "fever", "cough", "heart"];

/// Embeds text by counting vocabulary words, plus a small constant
/// component so no vector is all zeros.
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut embedding: Vec<f32> =
            KEYWORDS.iter().map(|k| text.matches(k).count() as f32).collect();
        embedding.push(0.01);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Fails every call after the first `healthy` ones.
#[derive(Debug)]
pub struct FlakyEmbedder {
    healthy: usize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(healthy: usize) -> Arc<Self> {
        Arc::new(Self { healthy, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            return Err(RagError::provider("flaky", "quota exceeded"));
        }
        Ok(KeywordEmbedder::vector(text))
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Answers the first `healthy` calls, then never completes.
#[derive(Debug)]
pub struct StallingEmbedder {
    healthy: usize,
    calls: AtomicUsize,
}

impl StallingEmbedder {
    pub fn new(healthy: usize) -> Arc<Self> {
        Arc::new(Self { healthy, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl EmbeddingProvider for StallingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            std::future::pending::<()>().await;
        }
        Ok(KeywordEmbedder::vector(text))
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

/// Returns vectors one entry too short.
#[derive(Debug)]
pub struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; KEYWORDS.len()])
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }
}

pub fn document(source: &str, document_type: DocumentType, content: &str) -> SourceDocument {
    SourceDocument::new(content, ChunkMetadata::new(source, document_type))
}

pub fn retriever(provider: Arc<dyn EmbeddingProvider>) -> Retriever {
    retriever_with(provider, RagConfig::default())
}

pub fn retriever_with(provider: Arc<dyn EmbeddingProvider>, config: RagConfig) -> Retriever {
    Retriever::builder().config(config).embedding_provider(provider).build().unwrap()
}

/// A small corpus with one paragraph per topic.
pub fn medical_corpus() -> Vec<SourceDocument> {
    vec![
        document(
            "diabetes_guideline.md",
            DocumentType::Guideline,
            "Diabetes symptoms include thirst and frequent urination. Diabetes needs monitoring.",
        ),
        document(
            "fever_research.txt",
            DocumentType::Research,
            "Fever above 39C in adults warrants a fever workup.",
        ),
        document("cough_faq.csv", DocumentType::General, "A dry cough lasting weeks should be checked."),
        document("heart_record", DocumentType::Record, "Patient reports heart palpitations at night."),
    ]
}
