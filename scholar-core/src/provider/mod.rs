//! Embedding provider abstraction layer.
//!
//! This module defines the interface the retrieval engine uses to turn text
//! into vectors, plus the Ollama HTTP implementation.

mod types;
pub mod ollama;

// Re-export common types
pub use types::{
    EmbedRequest,
    EmbedResponse,
    EmbeddingProvider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use ollama::OllamaEmbedder;
