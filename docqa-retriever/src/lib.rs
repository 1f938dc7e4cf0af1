//! docqa-retriever: retrieval core for single-document question answering
//!
//! An uploaded document, already extracted into per-page text, is split into
//! chunks, embedded, and stored as a per-document vector index. Questions are
//! answered against the one active document by nearest-neighbour search, and
//! the best chunks are formatted as page-cited context for an answer generator.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: document identity, index building, search, and the active-document session
//! - **[`storage`]**: persisted index artifacts and their on-disk format
//! - **[`config`]**: layered TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docqa_context::{ChunkKind, ChunkingConfig, PageText};
//! use docqa_embed::{EmbedConfig, create_provider};
//! use docqa_retriever::retrieval::{DocumentSession, format_context};
//! use docqa_retriever::storage::FileStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = create_provider(&EmbedConfig::default()).await?;
//! let store = Arc::new(FileStore::new("vector_store"));
//! let session = DocumentSession::new(ChunkingConfig::default(), 6, provider, store)?;
//!
//! let pages = vec![PageText::new(1, ChunkKind::Text, "Revenue grew 12% year over year.")];
//! session.upload("report.pdf", &pages).await?;
//!
//! let chunks = session.search("How did revenue change?", None).await?;
//! println!("{}", format_context(&chunks));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PageText → Chunker → EmbeddingProvider → IndexBuilder → IndexStore
//!                                                     ↓
//!        query → Retriever (bound to one DocumentIndex) → context
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::RetrieverConfig;
pub use error::{Result, RetrievalError};
