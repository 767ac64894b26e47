//! Session-scoped retrieval over scientific papers.
//!
//! # Architecture
//!
//! - [`RagManager`]: registry of isolated sessions sharing one embedder
//! - [`VectorStore`]: per-session embedder + index + document list
//! - [`SimilarityIndex`]: nearest-neighbor backends, built by [`create_index`]
//! - [`Embedder`]: validated access to the shared [`EmbeddingProvider`](crate::provider::EmbeddingProvider)
//! - [`DocumentProcessor`]: turns a paper on disk into [`Chunk`]s
//!
//! # How It Works
//!
//! 1. **Ingestion**:
//!    - The processor converts a PDF into ordered, page-tagged chunks
//!    - The manager stamps every chunk with its `paper_id`
//!    - The session's store embeds the batch in one call and appends vectors and chunks together
//!
//! 2. **Retrieval**:
//!    - The query is embedded with the same model
//!    - The index returns the nearest positions with their squared L2 distances
//!    - Positions map back to the stored chunks, lowest distance first

mod accelerated;
mod embedder;
mod index;
mod manager;
mod processor;
mod session;
mod store;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use embedder::{Embedder, EmbedderError};
pub use index::{create_index, FlatL2Index, IndexError, Neighbors, SimilarityIndex, MISSING};
pub use manager::RagManager;
#[cfg(feature = "pdf")]
pub use processor::PdfProcessor;
pub use processor::{DocumentProcessor, ProcessorError};
pub use store::{StoreError, VectorStore};
pub use types::{
    AddPaperStatus, Chunk, Metadata, QueryRecord, SessionInfo, PAGE_NUMBERS_KEY, PAPER_ID_KEY,
    SOURCE_KEY,
};

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: String },

    #[error("Failed to process paper {paper_id} for session {session_id}: {source}")]
    Processing {
        session_id: String,
        paper_id: String,
        source: ProcessorError,
    },

    #[error("Failed to ingest paper {paper_id} into session {session_id}: {source}")]
    Ingestion {
        session_id: String,
        paper_id: String,
        source: StoreError,
    },

    #[error("Query failed in session {session_id}: {source}")]
    Search {
        session_id: String,
        source: StoreError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, RagError>;
