//! Document conversion: PDF file in, ordered chunks out.
//!
//! The manager only depends on the [`DocumentProcessor`] trait. The built-in
//! [`PdfProcessor`] extracts text page by page and splits it into
//! overlapping chunks.

use super::types::{Chunk, PAGE_NUMBERS_KEY, SOURCE_KEY};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
#[cfg(feature = "pdf")]
use tracing::{debug, warn};

/// Errors that can occur while converting a document into chunks.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// An I/O error occurred while reading the document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The PDF could not be parsed.
    #[error("Failed to parse PDF {path}: {message}")]
    Parse { path: String, message: String },

    /// The document parsed but contained no extractable text.
    #[error("No text could be extracted from {0}")]
    NoContent(String),

    /// The blocking extraction task panicked or was cancelled.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Result type for processing operations.
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Turns a document on disk into an ordered sequence of chunks.
///
/// Every returned chunk has non-empty text and metadata with at least
/// `source` (the input path) and `page_numbers` (possibly empty).
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, path: &Path) -> Result<Vec<Chunk>>;
}

/// Splits text into overlapping chunks for better context preservation.
///
/// # UTF-8 Safety
///
/// Chunk boundaries are moved to the nearest character boundary so multi-byte
/// characters are never split.
pub(crate) fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + chunk_size).min(text.len());

        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        // A single character wider than chunk_size
        if end == start {
            end = start + 1;
            while end < text.len() && !text.is_char_boundary(end) {
                end += 1;
            }
        }

        chunks.push(text[start..end].to_string());

        if end == text.len() {
            break;
        }

        start = end.saturating_sub(overlap).max(start + 1);
        while start < text.len() && !text.is_char_boundary(start) {
            start += 1;
        }
    }

    chunks
}

/// Collapses runs of whitespace left behind by PDF text extraction.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds chunks from `(page_number, page_text)` pairs.
pub(crate) fn chunk_pages(
    source: &str,
    pages: impl IntoIterator<Item = (u32, String)>,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (page_number, page_text) in pages {
        let text = normalize_whitespace(&page_text);

        for piece in chunk_text(&text, chunk_size, overlap) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }

            let chunk_index = chunks.len();
            chunks.push(
                Chunk::new(piece)
                    .with_metadata(SOURCE_KEY, source)
                    .with_metadata(PAGE_NUMBERS_KEY, vec![page_number])
                    .with_metadata("chunk_index", chunk_index),
            );
        }
    }

    chunks
}

/// PDF processor backed by `lopdf`.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone)]
pub struct PdfProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

#[cfg(feature = "pdf")]
impl PdfProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    fn extract_pages(path: &Path) -> Result<Vec<(u32, String)>> {
        let parse_err = |e: lopdf::Error| ProcessorError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let document = lopdf::Document::load(path).map_err(parse_err)?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().into_keys() {
            match document.extract_text(&[page_number]) {
                Ok(text) => pages.push((page_number, text)),
                Err(e) => {
                    warn!(path = %path.display(), page = page_number, error = %e, "Skipping unreadable page");
                }
            }
        }

        Ok(pages)
    }
}

#[cfg(feature = "pdf")]
#[async_trait]
impl DocumentProcessor for PdfProcessor {
    async fn process(&self, path: &Path) -> Result<Vec<Chunk>> {
        if !tokio::fs::try_exists(path).await? {
            return Err(ProcessorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }

        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || Self::extract_pages(&owned))
            .await
            .map_err(|e| ProcessorError::Task(e.to_string()))??;

        let source = path.to_string_lossy().to_string();
        let chunks = chunk_pages(&source, pages, self.chunk_size, self.chunk_overlap);

        if chunks.is_empty() {
            return Err(ProcessorError::NoContent(source));
        }

        debug!(path = %source, chunks = chunks.len(), "Converted PDF");
        Ok(chunks)
    }
}
