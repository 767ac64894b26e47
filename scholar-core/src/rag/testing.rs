//! Test doubles for the embedding provider and document processor.

use super::processor::{DocumentProcessor, ProcessorError};
use super::types::{Chunk, PAGE_NUMBERS_KEY, SOURCE_KEY};
use crate::provider::{EmbeddingProvider, ProviderError};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Deterministic embedder: the same text always maps to the same vector.
pub(crate) struct MockEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MockEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of `encode` calls made so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn vector_for(&self, text: &str) -> Vec<f32> {
        (0..self.dimension)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                i.hash(&mut hasher);
                (hasher.finish() % 1000) as f32 / 1000.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Api("embedding server unavailable".to_string()));
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// [`MockEmbedder`] whose next `encode` call, once armed, parks until released.
pub(crate) struct GatedEmbedder {
    inner: MockEmbedder,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            inner: MockEmbedder::new(dimension),
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Makes the next `encode` call block.
    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Waits until the armed call is parked inside `encode`.
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the parked call finish.
    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.encode(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Returns the same fixed vectors for every call, whatever the input.
pub(crate) struct StaticEmbedder {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl StaticEmbedder {
    pub(crate) fn new(dimension: usize, vectors: Vec<Vec<f32>>) -> Self {
        Self { dimension, vectors }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(self.vectors.clone())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Processor returning a configured number of chunks per path.
///
/// Paths without an entry fail with a not-found I/O error.
#[derive(Default)]
pub(crate) struct MockProcessor {
    documents: HashMap<PathBuf, usize>,
    calls: AtomicUsize,
}

impl MockProcessor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_document(mut self, path: impl Into<PathBuf>, chunks: usize) -> Self {
        self.documents.insert(path.into(), chunks);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentProcessor for MockProcessor {
    async fn process(&self, path: &Path) -> Result<Vec<Chunk>, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let count = self.documents.get(path).copied().ok_or_else(|| {
            ProcessorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))
        })?;

        let source = path.to_string_lossy().to_string();
        Ok((0..count)
            .map(|i| {
                Chunk::new(format!("{} section {}", source, i))
                    .with_metadata(SOURCE_KEY, source.as_str())
                    .with_metadata(PAGE_NUMBERS_KEY, vec![i as u32 + 1])
            })
            .collect())
    }
}
