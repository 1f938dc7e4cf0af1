//! Error types for chunking

/// Result type for chunking operations.
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Errors raised while configuring the chunker or feeding it page records.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The chunking configuration cannot make forward progress
    #[error("Invalid chunking configuration: {message}")]
    InvalidConfig { message: String },

    /// Page numbers are 1-based
    #[error("Invalid page number {page} at record {index}: pages are numbered from 1")]
    InvalidPage { page: u32, index: usize },
}

impl ChunkError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
