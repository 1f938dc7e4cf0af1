//! This module turns per-page extracted document text into retrievable chunks,
//! the units that get embedded and indexed for passage retrieval.
//!
//! The extraction collaborator hands over one [`PageText`] record per page. Each
//! record already carries its page number and how its text was obtained
//! (`text` for the digital text layer, `ocr` for recognized scans). The
//! [`Chunker`] applies a [`ChunkPolicy`] to every page and emits [`Chunk`]s that
//! keep the page number and extraction kind of the page they came from.
//!
//! # Policies
//!
//! *   **Sliding window**: the page is cut into windows of `chunk_size`
//!     characters, each starting `chunk_size - chunk_overlap` characters after
//!     the previous one. Windows are trimmed and blank windows are dropped.
//! *   **Whole page**: the trimmed page becomes a single chunk. This suits
//!     digitally extracted pages that are displayed as one block.
//!
//! The policy is chosen per extraction kind, so a configuration can keep
//! digital pages whole while splitting long OCR output.
//!
//! Window boundaries are measured in Unicode scalar values, never in bytes, so
//! a window never cuts a multi-byte character in half.
//!
//! # Usage
//!
//! ```
//! use docqa_context::text::{ChunkKind, Chunker, ChunkingConfig, PageText};
//!
//! let config = ChunkingConfig::default()
//!     .with_chunk_size(40)
//!     .with_chunk_overlap(10);
//! let chunker = Chunker::new(config).unwrap();
//!
//! let text = "Revenue grew 10% year over year, driven by new markets.";
//! let pages = vec![
//!     PageText::new(1, ChunkKind::Text, text),
//!     PageText::new(2, ChunkKind::Ocr, "   "),
//! ];
//!
//! let chunks = chunker.chunk_pages(&pages).unwrap();
//!
//! // The blank OCR page yields nothing; page 1 is split into overlapping windows
//! assert_eq!(chunks.len(), 2);
//! assert!(chunks.iter().all(|c| c.page == 1 && c.kind == ChunkKind::Text));
//! assert!(chunks.iter().all(|c| c.content.chars().count() <= 40));
//! ```
use crate::error::{ChunkError, Result};
use serde::{Deserialize, Serialize};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// How a page's text was extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Text taken from the document's digital text layer
    Text,
    /// Text recovered by optical character recognition
    Ocr,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::Ocr => "ocr",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of extracted text, as delivered by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number
    pub page: u32,
    /// Extraction provenance
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// Raw page text
    pub content: String,
}

impl PageText {
    pub fn new(page: u32, kind: ChunkKind, content: impl Into<String>) -> Self {
        Self {
            page,
            kind,
            content: content.into(),
        }
    }
}

/// A unit of retrievable text.
///
/// The serialized form (`{"page", "type", "content"}`) is also the on-disk
/// metadata format of a document index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based page number the chunk was taken from
    pub page: u32,
    /// Extraction provenance, inherited from the page
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// Trimmed, non-empty chunk text
    pub content: String,
}

impl Chunk {
    pub fn new(page: u32, kind: ChunkKind, content: impl Into<String>) -> Self {
        Self {
            page,
            kind,
            content: content.into(),
        }
    }
}

/// Strategy used to cut a page into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// The whole trimmed page is one chunk
    WholePage,
    /// Fixed-size overlapping windows
    #[default]
    SlidingWindow,
}

impl std::str::FromStr for ChunkPolicy {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "whole_page" | "page" => Ok(ChunkPolicy::WholePage),
            "sliding_window" | "window" => Ok(ChunkPolicy::SlidingWindow),
            _ => Err(ChunkError::invalid_config(format!(
                "unknown chunk policy: {s}"
            ))),
        }
    }
}

/// Configuration for chunking pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows of the same page
    pub chunk_overlap: usize,
    /// Policy for pages extracted from the text layer
    pub text_policy: ChunkPolicy,
    /// Policy for OCR pages
    pub ocr_policy: ChunkPolicy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            text_policy: ChunkPolicy::SlidingWindow,
            ocr_policy: ChunkPolicy::SlidingWindow,
        }
    }
}

impl ChunkingConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Use the same policy for every extraction kind.
    pub fn with_policy(mut self, policy: ChunkPolicy) -> Self {
        self.text_policy = policy;
        self.ocr_policy = policy;
        self
    }

    pub fn with_text_policy(mut self, policy: ChunkPolicy) -> Self {
        self.text_policy = policy;
        self
    }

    pub fn with_ocr_policy(mut self, policy: ChunkPolicy) -> Self {
        self.ocr_policy = policy;
        self
    }

    /// The policy applied to pages of the given kind.
    pub fn policy_for(&self, kind: ChunkKind) -> ChunkPolicy {
        match kind {
            ChunkKind::Text => self.text_policy,
            ChunkKind::Ocr => self.ocr_policy,
        }
    }

    /// Number of characters the window start advances per step.
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap)
    }

    /// Reject configurations that could not terminate.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkError::invalid_config("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkError::invalid_config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A raw sliding window over a page, before trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    /// Offset of the first character of the window, in characters
    pub start: usize,
    /// Window text
    pub text: &'a str,
}

/// Splits page text into chunks according to a validated [`ChunkingConfig`].
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a chunker, failing fast on a configuration that cannot make progress.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Cut `text` into overlapping windows of at most `chunk_size` characters.
    ///
    /// Window starts are strictly increasing and iteration stops once a start
    /// reaches the end of the text.
    pub fn windows<'a>(&self, text: &'a str) -> Vec<Window<'a>> {
        let boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        let char_count = boundaries.len();
        let step = self.config.step();

        let mut windows = Vec::new();
        let mut start = 0;
        while start < char_count {
            let end = (start + self.config.chunk_size).min(char_count);
            let byte_end = if end == char_count {
                text.len()
            } else {
                boundaries[end]
            };
            windows.push(Window {
                start,
                text: &text[boundaries[start]..byte_end],
            });
            start += step;
        }
        windows
    }

    /// Chunk one page's text, tagging every chunk with `page` and `kind`.
    pub fn chunk(&self, text: &str, page: u32, kind: ChunkKind) -> Vec<Chunk> {
        match self.config.policy_for(kind) {
            ChunkPolicy::WholePage => {
                let content = text.trim();
                if content.is_empty() {
                    Vec::new()
                } else {
                    vec![Chunk::new(page, kind, content)]
                }
            }
            ChunkPolicy::SlidingWindow => self
                .windows(text)
                .into_iter()
                .map(|window| window.text.trim())
                .filter(|content| !content.is_empty())
                .map(|content| Chunk::new(page, kind, content))
                .collect(),
        }
    }

    /// Chunk every page of a document, preserving page order.
    pub fn chunk_pages(&self, pages: &[PageText]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for (index, page) in pages.iter().enumerate() {
            if page.page == 0 {
                return Err(ChunkError::InvalidPage {
                    page: page.page,
                    index,
                });
            }
            chunks.extend(self.chunk(&page.content, page.page, page.kind));
        }

        tracing::debug!(
            "Chunked {} pages into {} chunks (size: {}, overlap: {})",
            pages.len(),
            chunks.len(),
            self.config.chunk_size,
            self.config.chunk_overlap
        );

        Ok(chunks)
    }
}
