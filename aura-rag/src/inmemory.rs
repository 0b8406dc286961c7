//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps embedded chunks in insertion order behind a
//! `tokio::sync::RwLock`. Searches share the read lock and see every batch
//! either completely or not at all, because a batch is appended under a
//! single write lock only after all of its embeddings are in hand.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{DocumentChunk, RetrievalResult, SearchFilters};
use crate::embedding::{EmbeddingProvider, embed_with_timeout};
use crate::error::{RagError, Result};
use crate::similarity::cosine_similarity;

/// An append-only, in-memory store of embedded chunks.
///
/// The store owns the [`EmbeddingProvider`] used to embed inserted chunks,
/// which fixes the dimensionality of everything it holds.
///
/// # Example
///
/// ```rust,ignore
/// use aura_rag::InMemoryVectorStore;
///
/// let store = InMemoryVectorStore::new(Arc::new(embedder));
/// store.add_documents(chunks).await?;
/// let results = store.search(&query_embedding, 5, 0.3, None).await?;
/// ```
pub struct InMemoryVectorStore {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    embedding_timeout: Duration,
    chunks: RwLock<Vec<Arc<DocumentChunk>>>,
}

impl InMemoryVectorStore {
    /// Create an empty store with the default batch size and timeout.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_config(provider, &RagConfig::default())
    }

    /// Create an empty store using the batch size and timeout from `config`.
    pub fn with_config(provider: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self {
            provider,
            batch_size: config.embedding_batch_size.max(1),
            embedding_timeout: config.embedding_timeout,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// The provider that embeds inserted chunks.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed and append chunks, preserving their relative order.
    ///
    /// Chunks are embedded in batches of at most `embedding_batch_size`
    /// concurrent provider calls. Each batch is committed only once all of
    /// its embeddings have succeeded. Returns the number of chunks added.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] if any chunk has blank content; nothing is added.
    /// - [`RagError::Provider`] if an embedding call in a batch fails or times
    ///   out. That batch is discarded; earlier batches stay committed.
    /// - [`RagError::DimensionMismatch`] if the provider returns a vector of
    ///   the wrong length. That batch is discarded.
    pub async fn add_documents(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        if let Some(blank) = chunks.iter().find(|c| c.content.trim().is_empty()) {
            return Err(RagError::Validation(format!("chunk '{}' has no content", blank.id)));
        }

        let provider = self.provider.as_ref();
        let mut added = 0;

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let embeddings = try_join_all(
                batch.iter().map(|c| embed_with_timeout(provider, &c.content, self.embedding_timeout)),
            )
            .await
            .inspect_err(|e| {
                error!(batch_index, batch_size = batch.len(), error = %e, "embedding batch failed");
            })?;

            let mut embedded = Vec::with_capacity(batch.len());
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                self.check_dimensions(&embedding)?;
                embedded.push(Arc::new(DocumentChunk { embedding: Some(embedding), ..chunk.clone() }));
            }

            let mut stored = self.chunks.write().await;
            stored.extend(embedded);
            added += batch.len();
            debug!(batch_index, batch_size = batch.len(), total = stored.len(), "committed batch");
        }

        let total = self.len().await;
        info!(added, total, "added chunks to vector store");
        Ok(added)
    }

    /// Append chunks that already carry embeddings, without calling the provider.
    ///
    /// All chunks are checked before any is added.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for a chunk without an embedding and
    /// [`RagError::DimensionMismatch`] for one of the wrong length.
    pub async fn insert_embedded(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        for chunk in &chunks {
            let embedding = chunk.embedding.as_deref().ok_or_else(|| {
                RagError::Validation(format!("chunk '{}' has no embedding", chunk.id))
            })?;
            self.check_dimensions(embedding)?;
        }

        let added = chunks.len();
        let mut stored = self.chunks.write().await;
        stored.extend(chunks.into_iter().map(Arc::new));
        info!(added, total = stored.len(), "inserted pre-embedded chunks");
        Ok(added)
    }

    /// Return up to `top_k` chunks scoring at least `threshold` against
    /// `query_embedding`, best first.
    ///
    /// `filters` narrows candidates before scoring. Chunks without an
    /// embedding are skipped. Ties keep insertion order. Ranks run 1..N over
    /// the returned results. An empty store or no qualifying chunk yields an
    /// empty `Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query_embedding` does not
    /// match the stored dimensionality.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        threshold: f32,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<RetrievalResult>> {
        let stored = self.chunks.read().await;
        if stored.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = Vec::new();
        for chunk in stored.iter() {
            let Some(embedding) = chunk.embedding.as_deref() else {
                continue;
            };
            if filters.is_some_and(|f| !f.matches(&chunk.metadata)) {
                continue;
            }
            let similarity = cosine_similarity(embedding, query_embedding).inspect_err(|e| {
                error!(chunk.id = %chunk.id, error = %e, "similarity invariant violated");
            })?;
            if similarity >= threshold {
                scored.push(RetrievalResult { chunk: Arc::clone(chunk), similarity, rank: 0 });
            }
        }
        let candidates = stored.len();
        drop(stored);

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);
        for (index, result) in scored.iter_mut().enumerate() {
            result.rank = index + 1;
        }

        debug!(candidates, result_count = scored.len(), "vector search completed");
        Ok(scored)
    }

    /// Remove every stored chunk.
    pub async fn clear(&self) {
        let mut stored = self.chunks.write().await;
        let removed = stored.len();
        stored.clear();
        info!(removed, "cleared vector store");
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// Whether the store holds no chunks.
    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// A snapshot of the stored chunks in insertion order.
    pub async fn documents(&self) -> Vec<Arc<DocumentChunk>> {
        self.chunks.read().await.clone()
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.provider.dimensions();
        if embedding.len() != expected {
            error!(expected, actual = embedding.len(), "embedding has wrong dimensionality");
            return Err(RagError::DimensionMismatch { expected, actual: embedding.len() });
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("provider", &self.provider.name())
            .field("batch_size", &self.batch_size)
            .field("embedding_timeout", &self.embedding_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::document::{ChunkMetadata, DocumentType};

    /// Embeds text as `[len, 1.0]`; fails on any text containing "FAIL".
    #[derive(Default)]
    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                return Err(RagError::provider("length", "refused"));
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn chunk(id: &str, content: &str, document_type: DocumentType) -> DocumentChunk {
        DocumentChunk {
            id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata::new(format!("{id}.md"), document_type),
            embedding: None,
        }
    }

    fn embedded(id: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk { embedding: Some(embedding), ..chunk(id, "text", DocumentType::General) }
    }

    #[tokio::test]
    async fn add_documents_embeds_in_order() {
        let store = InMemoryVectorStore::new(Arc::new(LengthEmbedder::default()));
        let added = store
            .add_documents(vec![
                chunk("a", "one", DocumentType::General),
                chunk("b", "three", DocumentType::General),
            ])
            .await
            .unwrap();

        assert_eq!(added, 2);
        let docs = store.documents().await;
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].embedding.as_deref(), Some(&[3.0, 1.0][..]));
        assert_eq!(docs[1].id, "b");
    }

    #[tokio::test]
    async fn failed_batch_is_not_committed_but_earlier_batches_are() {
        let embedder = Arc::new(LengthEmbedder::default());
        let config = RagConfig::builder().embedding_batch_size(2).build().unwrap();
        let store = InMemoryVectorStore::with_config(embedder, &config);

        let err = store
            .add_documents(vec![
                chunk("a", "ok", DocumentType::General),
                chunk("b", "ok", DocumentType::General),
                chunk("c", "ok", DocumentType::General),
                chunk("d", "FAIL", DocumentType::General),
                chunk("e", "ok", DocumentType::General),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Provider { .. }));
        let ids: Vec<_> = store.documents().await.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn blank_chunk_is_rejected_before_any_call() {
        let embedder = Arc::new(LengthEmbedder::default());
        let store = InMemoryVectorStore::new(embedder.clone());
        let err = store
            .add_documents(vec![
                chunk("a", "ok", DocumentType::General),
                chunk("b", "  ", DocumentType::General),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn search_on_empty_store_is_empty() {
        let store = InMemoryVectorStore::new(Arc::new(LengthEmbedder::default()));
        assert!(store.search(&[1.0, 0.0], 5, 0.0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_ranks_filters_and_thresholds() {
        let store = InMemoryVectorStore::new(Arc::new(LengthEmbedder::default()));
        store
            .insert_embedded(vec![
                embedded("far", vec![0.0, 1.0]),
                embedded("near", vec![1.0, 0.1]),
                embedded("exact", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 5, 0.5, None).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);

        let top_one = store.search(&[1.0, 0.0], 1, -1.0, None).await.unwrap();
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].chunk.id, "exact");

        let filters = SearchFilters { source: Some("far.md".into()), ..Default::default() };
        let filtered = store.search(&[1.0, 0.0], 5, -1.0, Some(&filters)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].chunk.id, "far");
        assert_eq!(filtered[0].rank, 1);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new(Arc::new(LengthEmbedder::default()));
        store
            .insert_embedded(vec![
                embedded("first", vec![2.0, 0.0]),
                embedded("second", vec![1.0, 0.0]),
                embedded("third", vec![3.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 3, 0.0, None).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn insert_embedded_rejects_wrong_dimensions_atomically() {
        let store = InMemoryVectorStore::new(Arc::new(LengthEmbedder::default()));
        let err = store
            .insert_embedded(vec![embedded("ok", vec![1.0, 0.0]), embedded("bad", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
        assert!(store.is_empty().await);

        let missing = store.insert_embedded(vec![chunk("x", "t", DocumentType::General)]).await;
        assert!(matches!(missing, Err(RagError::Validation(_))));
    }

    #[tokio::test]
    async fn mismatched_query_dimensions_fail_search() {
        let store = InMemoryVectorStore::new(Arc::new(LengthEmbedder::default()));
        store.insert_embedded(vec![embedded("a", vec![1.0, 0.0])]).await.unwrap();
        let err = store.search(&[1.0, 0.0, 0.0], 5, 0.0, None).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = InMemoryVectorStore::new(Arc::new(LengthEmbedder::default()));
        store.insert_embedded(vec![embedded("a", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(store.len().await, 1);
        store.clear().await;
        assert!(store.is_empty().await);
    }
}
