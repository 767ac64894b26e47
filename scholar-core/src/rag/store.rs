//! Per-session vector store.
//!
//! A [`VectorStore`] couples the shared [`Embedder`] with one similarity index
//! and the ordered list of chunks that index describes. Index position `i`
//! always refers to `documents[i]`.

use super::embedder::{Embedder, EmbedderError};
use super::index::{create_index, IndexError, SimilarityIndex};
use super::types::Chunk;
use crate::config::IndexBackend;
use crate::detection::Device;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Embedding failed: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Index operation failed: {0}")]
    Index(#[from] IndexError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Embedding + index + document list backing one session.
///
/// Mutation goes through `&mut self`, so the owner's lock decides who may add:
/// the session wraps the store in a reader/writer lock, which serializes adds
/// and keeps searches out while one is running.
pub struct VectorStore {
    embedder: Embedder,
    index: Option<Box<dyn SimilarityIndex>>,
    documents: Vec<Arc<Chunk>>,
}

impl VectorStore {
    /// Creates an empty store bound to the shared embedder.
    ///
    /// The index is sized to the embedder's dimensionality and built by
    /// [`create_index`]. If no index can be built the store runs degraded:
    /// ingests are accepted without storing anything and searches return
    /// nothing.
    pub fn new(embedder: Embedder, backend: IndexBackend, device: Device) -> Self {
        let index = create_index(backend, embedder.dimension(), device);
        Self::with_index(embedder, index)
    }

    pub(crate) fn with_index(embedder: Embedder, index: Option<Box<dyn SimilarityIndex>>) -> Self {
        Self {
            embedder,
            index,
            documents: Vec::new(),
        }
    }

    /// Embeds `chunks` in one batch and appends them to the index and document list.
    ///
    /// Empty input is a no-op. On error neither the index nor the document
    /// list changes. In degraded mode the chunks are accepted and dropped
    /// without calling the embedder.
    pub async fn add_documents(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let index = match self.index.as_mut() {
            Some(index) => index,
            None => {
                warn!(chunks = chunks.len(), "No similarity index, chunks are not searchable");
                return Ok(());
            }
        };

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        index.add(&embeddings)?;
        self.documents.extend(chunks.into_iter().map(Arc::new));

        debug!(
            added = embeddings.len(),
            total = self.documents.len(),
            backend = index.name(),
            "Added documents to vector store"
        );
        Ok(())
    }

    /// Returns up to `k` stored chunks nearest to `query`, closest first.
    ///
    /// An empty store answers without calling the embedder. `k` is capped at
    /// the number of stored chunks. Neighbor positions that are missing or
    /// outside the document list are skipped.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<(Arc<Chunk>, f32)>> {
        let k = k.min(self.documents.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let index = match self.index.as_ref() {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };

        let query_embedding = self.embedder.embed(query).await?;
        let neighbors = index.search(&query_embedding, k)?;

        let results = neighbors
            .ids
            .iter()
            .zip(neighbors.distances.iter())
            .filter_map(|(&id, &distance)| {
                let position = usize::try_from(id).ok()?;
                self.documents
                    .get(position)
                    .map(|chunk| (Arc::clone(chunk), distance))
            })
            .collect();

        Ok(results)
    }

    /// Empties the index and the document list together.
    pub fn clear(&mut self) {
        if let Some(index) = self.index.as_mut() {
            index.reset();
        }
        self.documents.clear();
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of vectors in the index (zero when degraded).
    pub fn index_count(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.count())
    }

    /// Stored chunks in index order.
    pub fn documents(&self) -> &[Arc<Chunk>] {
        &self.documents
    }

    pub fn is_degraded(&self) -> bool {
        self.index.is_none()
    }

    /// Name of the index backend in use, if any.
    pub fn backend(&self) -> Option<&'static str> {
        self.index.as_ref().map(|index| index.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::{FlatL2Index, Neighbors, MISSING};
    use crate::rag::testing::MockEmbedder;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts.iter().map(|text| Chunk::new(*text)).collect()
    }

    fn store(mock: &Arc<MockEmbedder>) -> VectorStore {
        VectorStore::new(Embedder::new(mock.clone()), IndexBackend::Flat, Device::Cpu)
    }

    #[tokio::test]
    async fn test_add_embeds_once_and_stays_aligned() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);

        store.add_documents(chunks(&["a", "b", "c"])).await.unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(store.len(), 3);
        assert_eq!(store.index_count(), 3);
        assert_eq!(store.documents()[1].text, "b");
    }

    #[tokio::test]
    async fn test_empty_add_is_noop() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);

        store.add_documents(Vec::new()).await.unwrap();

        assert_eq!(mock.calls(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_embedding_changes_nothing() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);
        store.add_documents(chunks(&["a"])).await.unwrap();

        mock.set_failing(true);
        let err = store.add_documents(chunks(&["b", "c"])).await.unwrap_err();

        assert!(matches!(err, StoreError::Embedder(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.index_count(), 1);
    }

    #[tokio::test]
    async fn test_search_empty_store_skips_embedder() {
        let mock = Arc::new(MockEmbedder::new(8));
        let store = store(&mock);

        assert!(store.search("anything", 5).await.unwrap().is_empty());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_finds_exact_match_first() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);
        store
            .add_documents(chunks(&["transformers", "convolutions", "recurrence"]))
            .await
            .unwrap();

        let results = store.search("convolutions", 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0.text, "convolutions");
        assert_eq!(results[0].1, 0.0);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[tokio::test]
    async fn test_search_returns_shared_chunks() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);
        store.add_documents(chunks(&["a"])).await.unwrap();

        let results = store.search("a", 1).await.unwrap();
        assert!(Arc::ptr_eq(&results[0].0, &store.documents()[0]));
    }

    #[tokio::test]
    async fn test_search_k_larger_than_store() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);
        store.add_documents(chunks(&["a", "b"])).await.unwrap();

        assert_eq!(store.search("a", 10).await.unwrap().len(), 2);
        assert!(store.search("a", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_huge_k_returns_stored_count() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);
        store.add_documents(chunks(&["a"])).await.unwrap();

        let results = store.search("a", usize::MAX).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.text, "a");
    }

    #[tokio::test]
    async fn test_search_skips_out_of_range_positions() {
        let mock = Arc::new(MockEmbedder::new(2));
        let mut store = VectorStore::with_index(
            Embedder::new(mock.clone()),
            Some(Box::new(OverreportingIndex(FlatL2Index::new(2).unwrap()))),
        );
        store.add_documents(chunks(&["a"])).await.unwrap();

        let results = store.search("a", 3).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_store_accepts_and_returns_nothing() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = VectorStore::new(Embedder::new(mock.clone()), IndexBackend::Disabled, Device::Cpu);

        store.add_documents(chunks(&["a", "b"])).await.unwrap();

        assert!(store.is_degraded());
        assert_eq!(store.len(), store.index_count());
        assert!(store.search("a", 5).await.unwrap().is_empty());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_clear_empties_both() {
        let mock = Arc::new(MockEmbedder::new(8));
        let mut store = store(&mock);
        store.add_documents(chunks(&["a", "b"])).await.unwrap();

        store.clear();

        assert_eq!(store.len(), 0);
        assert_eq!(store.index_count(), 0);
        assert!(store.search("a", 1).await.unwrap().is_empty());
    }

    /// Reports a stale position and a sentinel ahead of the real neighbors.
    struct OverreportingIndex(FlatL2Index);

    impl SimilarityIndex for OverreportingIndex {
        fn name(&self) -> &'static str {
            "overreporting"
        }
        fn dimension(&self) -> usize {
            self.0.dimension()
        }
        fn count(&self) -> usize {
            self.0.count()
        }
        fn add(&mut self, vectors: &[Vec<f32>]) -> crate::rag::index::Result<()> {
            self.0.add(vectors)
        }
        fn search(&self, query: &[f32], k: usize) -> crate::rag::index::Result<Neighbors> {
            let real = self.0.search(query, k)?;
            let mut neighbors = Neighbors {
                ids: vec![99, MISSING],
                distances: vec![0.0, f32::INFINITY],
            };
            neighbors.ids.extend(real.ids);
            neighbors.distances.extend(real.distances);
            Ok(neighbors)
        }
        fn reset(&mut self) {
            self.0.reset()
        }
    }
}
