//! # docqa-embed
//!
//! Text embedding for document retrieval. Chunks and queries are mapped to
//! fixed-dimension dense vectors by an [`EmbeddingProvider`]; the same provider
//! configuration must embed both sides, so every provider reports an
//! [`EmbeddingModelMetadata`] identity that indexes record and check.
//!
//! ## Providers
//!
//! - [`FastEmbedProvider`]: local ONNX sentence-embedding models through
//!   fastembed (default `all-MiniLM-L6-v2`, 384 dimensions). Models are loaded
//!   once per process and cached; inference runs on blocking threads.
//! - [`HashEmbedProvider`]: deterministic feature hashing with no model files,
//!   for offline use and tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docqa_embed::{EmbedConfig, create_provider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = create_provider(&EmbedConfig::default()).await?;
//!
//! let texts = vec!["Revenue grew 10%.".to_string(), "Outlook is cautious.".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Memory Usage
//!
//! Embeddings are returned as half-precision (f16) vectors. Normalization, when
//! enabled, is applied in f32 before the conversion.

pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;

// Re-export main types for easy access
pub use config::{DEFAULT_MODEL, EmbedConfig, ProviderKind};
pub use error::{EmbedError, Result};
pub use hashing::HashEmbedProvider;
pub use provider::{
    EmbeddingModelMetadata, EmbeddingProvider, EmbeddingResult, FastEmbedProvider,
    create_provider, normalize_l2,
};
