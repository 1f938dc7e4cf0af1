//! Error taxonomy for indexing and retrieval.
//!
//! Every variant is a recoverable, caller-facing condition: an empty upload, a
//! persisted index that does not match the configured model, a search before
//! any document was indexed, or a bad setting. None of them should bring the
//! process down.

use docqa_context::ChunkError;
use docqa_embed::EmbedError;

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Chunking produced nothing searchable
    #[error("Document '{document}' has no extractable text to index")]
    EmptyDocument { document: String },

    /// A persisted index does not match the configured embedding dimension
    #[error(
        "Index for '{document}' holds {found}-dimensional vectors, the configured model produces {expected}"
    )]
    DimensionMismatch {
        document: String,
        expected: usize,
        found: usize,
    },

    /// A persisted index was built by a different model or normalization policy
    #[error("Index for '{document}' was built with {found}, the configured model is {expected}")]
    ModelMismatch {
        document: String,
        expected: String,
        found: String,
    },

    /// No index exists for the requested document, or no document is active
    #[error("{}", describe_missing_index(.document))]
    IndexNotFound { document: Option<String> },

    /// Invalid setting, rejected before any work is done
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A newer upload replaced this one while it was being built
    #[error("Indexing of '{document}' was superseded by a newer upload")]
    Superseded { document: String },

    /// Persisted artifacts are unreadable or inconsistent with each other
    #[error("Corrupt index for '{document}': {message}")]
    CorruptIndex { document: String, message: String },

    #[error(transparent)]
    Chunking(#[from] ChunkError),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid configuration file: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

fn describe_missing_index(document: &Option<String>) -> String {
    match document {
        Some(document) => format!("No index found for document '{document}'"),
        None => "No document has been indexed yet; upload a document first".to_string(),
    }
}

impl RetrievalError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn corrupt<D: Into<String>, S: Into<String>>(document: D, message: S) -> Self {
        Self::CorruptIndex {
            document: document.into(),
            message: message.into(),
        }
    }

    pub fn not_found<D: Into<String>>(document: D) -> Self {
        Self::IndexNotFound {
            document: Some(document.into()),
        }
    }

    /// Whether a second attempt of the failed operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Embedding(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether the error means "artifact absent or unusable", so rebuilding is the remedy.
    pub fn is_stale_index(&self) -> bool {
        matches!(
            self,
            Self::IndexNotFound { .. }
                | Self::DimensionMismatch { .. }
                | Self::ModelMismatch { .. }
                | Self::CorruptIndex { .. }
        )
    }
}
