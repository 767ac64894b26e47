//! scholar-core - Session-scoped retrieval engine for scientific papers
//!
//! Provides the building blocks for asking questions against a private
//! collection of papers:
//! - Embedding provider abstraction (Ollama)
//! - Similarity indexes with accelerator probing and CPU fallback
//! - Per-session vector stores and the session registry
//! - Configuration management and environment detection
//!
//! ## Primary API
//!
//! Users should interact with scholar via [`RagManager`].

// Public modules
pub mod config;
pub mod detection;
pub mod models;
pub mod provider;
pub mod rag;

// Public exports
pub use config::{Config, ConfigError, DevicePreference, IndexBackend};
pub use detection::{check_ollama_silent, resolve_device, DetectionError, Device, OllamaInfo};
pub use rag::{AddPaperStatus, Chunk, QueryRecord, RagError, RagManager, SessionInfo};

// Provider exports
pub use provider::{EmbeddingProvider, OllamaEmbedder, ProviderError};
