//! Session registry.
//!
//! [`RagManager`] owns every live session and the single embedding provider
//! they share. Callers address sessions by the opaque id returned from
//! [`create_session`](RagManager::create_session).

use super::embedder::Embedder;
use super::processor::DocumentProcessor;
use super::session::Session;
use super::store::VectorStore;
use super::types::{AddPaperStatus, Chunk, QueryRecord, SessionInfo, PAPER_ID_KEY};
use super::{RagError, Result};
use crate::config::{Config, IndexBackend};
use crate::detection::Device;
use crate::provider::EmbeddingProvider;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Multi-session retrieval engine.
///
/// The manager is built once per process. The embedding provider and the
/// device are fixed at construction and handed to every session's
/// [`VectorStore`]; sessions never load their own model.
///
/// # Thread Safety
///
/// All operations take `&self`. Wrap the manager in an `Arc` to share it
/// between tasks. The registry lock is only held for lookups and
/// inserts/removals, so work on one session never blocks another.
///
/// # Example
///
/// ```no_run
/// # use scholar_core::{Config, RagManager};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = RagManager::new(&Config::default())?;
/// let session = manager.create_session().await;
///
/// let status = manager.add_paper(&session, "1706.03762", "/tmp/1706.03762.pdf").await?;
/// println!("{}", status);
///
/// for record in manager.query(&session, "What is multi-head attention?", None).await? {
///     println!("{:.3} {}", record.score, record.text());
/// }
/// # Ok(())
/// # }
/// ```
pub struct RagManager {
    embedder: Embedder,
    processor: Arc<dyn DocumentProcessor>,
    backend: IndexBackend,
    device: Device,
    top_k: usize,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl RagManager {
    /// Builds a manager with the Ollama embedder and the PDF processor.
    ///
    /// The device is resolved here, once, from `config.device`. Fails only if
    /// the embedding dimension cannot be determined.
    #[cfg(feature = "pdf")]
    pub fn new(config: &Config) -> Result<Self> {
        use super::processor::PdfProcessor;
        use crate::detection::resolve_device;
        use crate::provider::OllamaEmbedder;

        let device = resolve_device(config.device);
        let dimension = config.embedding.resolve_dimension()?;

        let provider = Arc::new(OllamaEmbedder::new(&config.embedding, dimension, device));
        let processor = Arc::new(PdfProcessor::new(
            config.rag.chunk_size,
            config.rag.chunk_overlap,
        ));

        Ok(Self::with_components(config, device, provider, processor))
    }

    /// Builds a manager around caller-supplied collaborators.
    ///
    /// Only the `rag` and `index` sections of `config` are read; embedding
    /// settings are whatever `provider` was built with.
    pub fn with_components(
        config: &Config,
        device: Device,
        provider: Arc<dyn EmbeddingProvider>,
        processor: Arc<dyn DocumentProcessor>,
    ) -> Self {
        let embedder = Embedder::new(provider);

        info!(
            %device,
            model = embedder.model(),
            dimension = embedder.dimension(),
            backend = ?config.index.backend,
            "Initialized retrieval engine"
        );

        Self {
            embedder,
            processor,
            backend: config.index.backend,
            device,
            top_k: config.rag.top_k,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty session and returns its id.
    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let store = VectorStore::new(self.embedder.clone(), self.backend, self.device);
        let session = Arc::new(Session::new(id.clone(), store));

        self.sessions.write().await.insert(id.clone(), session);
        info!(session_id = %id, "Created session");
        id
    }

    /// Removes a session and everything it holds.
    ///
    /// Returns `false` if no such session exists. Operations already running
    /// against the session finish on their own handle.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id, "Deleted session");
        }
        removed
    }

    /// Processes the document at `path` and ingests it under `paper_id`.
    ///
    /// A paper already in the session is reported as
    /// [`AddPaperStatus::AlreadyPresent`] without reading the file. If
    /// processing or ingestion fails, the paper is not recorded and the call
    /// can be retried.
    pub async fn add_paper(
        &self,
        session_id: &str,
        paper_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<AddPaperStatus> {
        let path = path.as_ref();
        let session = self.session(session_id).await?;

        if session.contains_paper(paper_id).await {
            debug!(session_id, paper_id, "Paper already in session");
            return Ok(AddPaperStatus::AlreadyPresent {
                paper_id: paper_id.to_string(),
            });
        }

        // Conversion runs without holding the session lock.
        let chunks = self.processor.process(path).await.map_err(|source| {
            error!(session_id, paper_id, path = %path.display(), error = %source, "Failed to process paper");
            RagError::Processing {
                session_id: session_id.to_string(),
                paper_id: paper_id.to_string(),
                source,
            }
        })?;

        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .map(|chunk| chunk.with_metadata(PAPER_ID_KEY, paper_id))
            .collect();
        let chunk_count = chunks.len();

        let mut state = session.state.write().await;

        // A concurrent add of the same paper may have finished first.
        if state.papers.contains(paper_id) {
            debug!(session_id, paper_id, "Paper ingested concurrently, discarding chunks");
            return Ok(AddPaperStatus::AlreadyPresent {
                paper_id: paper_id.to_string(),
            });
        }

        state.store.add_documents(chunks).await.map_err(|source| {
            error!(session_id, paper_id, error = %source, "Failed to ingest paper");
            RagError::Ingestion {
                session_id: session_id.to_string(),
                paper_id: paper_id.to_string(),
                source,
            }
        })?;
        state.papers.insert(paper_id.to_string());
        drop(state);

        info!(session_id, paper_id, chunks = chunk_count, "Added paper to session");
        Ok(AddPaperStatus::Added {
            session_id: session_id.to_string(),
            paper_id: paper_id.to_string(),
            chunks: chunk_count,
        })
    }

    /// Returns up to `k` chunks nearest to `query_text`, best first.
    ///
    /// `k` defaults to the configured `rag.top_k`. Each record's `score` is
    /// the raw squared L2 distance: lower is better.
    pub async fn query(
        &self,
        session_id: &str,
        query_text: &str,
        k: Option<usize>,
    ) -> Result<Vec<QueryRecord>> {
        let k = k.unwrap_or(self.top_k);
        let session = self.session(session_id).await?;

        let state = session.state.read().await;
        let hits = state
            .store
            .search(query_text, k)
            .await
            .map_err(|source| {
                error!(session_id, error = %source, "Query failed");
                RagError::Search {
                    session_id: session_id.to_string(),
                    source,
                }
            })?;

        debug!(session_id, k, results = hits.len(), "Answered query");
        Ok(hits
            .into_iter()
            .map(|(chunk, score)| QueryRecord { chunk, score })
            .collect())
    }

    /// Ids of every live session, sorted.
    pub async fn list_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Summary of a session, or `None` if it does not exist.
    pub async fn get_session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let session = self.sessions.read().await.get(session_id).cloned()?;
        Some(session.info().await)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Name of the shared embedding model.
    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    async fn session(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| RagError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }
}
