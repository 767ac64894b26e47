//! Embedding generation through the shared provider.
//!
//! [`Embedder`] is the handle every session's vector store holds. It forwards
//! to the single process-wide [`EmbeddingProvider`] and checks what comes back
//! before any vector reaches an index.

use crate::provider::{EmbeddingProvider, ProviderError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider returned a different number of vectors than texts sent.
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// A vector did not have the provider's advertised dimensionality.
    #[error("Embedding {position} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    /// A vector contained NaN or infinity, which would poison distance math.
    #[error("Embedding {position} contains non-finite values")]
    NonFinite { position: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Cheap-to-clone handle on the shared embedding provider.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn model(&self) -> &str {
        self.provider.name()
    }

    /// Embeds a batch of texts in a single provider call.
    ///
    /// The result has exactly one vector per input, in input order, each of
    /// length [`dimension`](Self::dimension).
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.provider.encode(texts).await?;
        self.validate(texts.len(), &embeddings)?;
        Ok(embeddings)
    }

    /// Embeds a single query string.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.pop().ok_or(EmbedderError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    fn validate(&self, expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
        if embeddings.len() != expected {
            return Err(EmbedderError::CountMismatch {
                expected,
                actual: embeddings.len(),
            });
        }

        let dimension = self.dimension();
        for (position, vector) in embeddings.iter().enumerate() {
            if vector.len() != dimension {
                return Err(EmbedderError::DimensionMismatch {
                    position,
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(EmbedderError::NonFinite { position });
            }
        }

        Ok(())
    }
}
