use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Open mapping of provenance fields attached to a chunk.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the originating file path.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the list of pages a chunk spans.
pub const PAGE_NUMBERS_KEY: &str = "page_numbers";
/// Metadata key stamped by the manager when a chunk is ingested.
pub const PAPER_ID_KEY: &str = "paper_id";

/// A unit of extracted document text plus its provenance.
///
/// Once handed to a [`VectorStore`](super::VectorStore) a chunk is kept behind
/// an `Arc` and never mutated again.
///
/// # Example
///
/// ```
/// # use scholar_core::rag::Chunk;
/// let chunk = Chunk::new("Attention is all you need.")
///     .with_metadata("source", "/tmp/1706.03762.pdf")
///     .with_metadata("page_numbers", vec![1u32]);
/// assert_eq!(chunk.page_numbers(), vec![1]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        self.metadata
            .get(PAGE_NUMBERS_KEY)
            .and_then(Value::as_array)
            .map(|pages| {
                pages
                    .iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|page| u32::try_from(page).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn paper_id(&self) -> Option<&str> {
        self.metadata.get(PAPER_ID_KEY).and_then(Value::as_str)
    }
}

/// A query hit: a shared reference to the stored chunk and its distance.
///
/// Serializes as `{text, metadata, score}`. `score` is the raw squared L2
/// distance, so lower is better.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub chunk: Arc<Chunk>,
    pub score: f32,
}

impl QueryRecord {
    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.chunk.metadata
    }
}

impl Serialize for QueryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("QueryRecord", 3)?;
        record.serialize_field("text", &self.chunk.text)?;
        record.serialize_field("metadata", &self.chunk.metadata)?;
        record.serialize_field("score", &self.score)?;
        record.end()
    }
}

/// Summary of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub paper_count: usize,
    pub active_papers: Vec<String>,
}

/// Outcome of a successful `add_paper` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddPaperStatus {
    Added {
        session_id: String,
        paper_id: String,
        chunks: usize,
    },
    /// The paper was ingested earlier; nothing was processed or embedded.
    AlreadyPresent { paper_id: String },
}

impl fmt::Display for AddPaperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddPaperStatus::Added { session_id, paper_id, chunks } => write!(
                f,
                "Successfully added paper {} to session {}. Processed {} chunks.",
                paper_id, session_id, chunks
            ),
            AddPaperStatus::AlreadyPresent { paper_id } => {
                write!(f, "Paper {} already in session.", paper_id)
            }
        }
    }
}
