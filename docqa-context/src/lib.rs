pub mod error;
pub mod text;

// Re-export the chunking entry points for external use
pub use error::{ChunkError, Result};
pub use text::{Chunk, ChunkKind, ChunkPolicy, Chunker, ChunkingConfig, PageText, Window};
