//! Embedding errors

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Generation and task failures count as transient (see
/// [`EmbedError::is_transient`]); callers retry those at most once.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// The configured model name is not one the provider can load
    #[error("Unknown embedding model '{name}' for provider {provider}")]
    UnknownModel { name: String, provider: String },

    /// Fetching, loading or validating model weights failed
    #[error("Failed to load embedding model: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The model failed while embedding input text
    #[error("Failed to embed text: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A blocking inference task panicked or was cancelled
    #[error("Embedding task did not complete: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error(transparent)]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    pub fn model_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the failure may succeed on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingGeneration { .. } | Self::AsyncTask { .. }
        )
    }
}
