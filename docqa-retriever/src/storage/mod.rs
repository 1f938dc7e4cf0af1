//! Persistence layer for document indexes
//!
//! Each document is stored as two artifacts keyed by its [`DocumentId`]:
//!
//! ```text
//! <id>.vidx        binary vector store (see `codec`)
//! <id>_meta.json   chunk metadata, one record per vector, same order
//! ```
//!
//! Stores never hand out an index that disagrees with the caller's embedding
//! model. [`IndexStore::load`] checks the recorded dimension and model identity
//! before decoding any vectors and reports a mismatch instead of returning
//! results from incomparable vector spaces.

use crate::error::{Result, RetrievalError};
use crate::retrieval::{DocumentId, DocumentIndex};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docqa_embed::EmbeddingModelMetadata;
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod file_store;
pub mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

/// Descriptive header written in front of the vector payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub document_id: DocumentId,
    pub source_name: String,
    pub model: EmbeddingModelMetadata,
    pub created_at: DateTime<Utc>,
    /// Number of vectors (and chunk records)
    pub count: usize,
    pub dimension: usize,
}

impl IndexHeader {
    pub fn for_index(index: &DocumentIndex) -> Self {
        Self {
            document_id: index.document_id().clone(),
            source_name: index.source_name().to_string(),
            model: index.model().clone(),
            created_at: index.created_at(),
            count: index.len(),
            dimension: index.dimension(),
        }
    }

    /// Reject an index whose vectors were produced by a different model.
    ///
    /// Dimension is checked first since it is the more fundamental
    /// incompatibility.
    pub fn check_compatible(&self, model: &EmbeddingModelMetadata) -> Result<()> {
        if self.dimension != model.dimension {
            return Err(RetrievalError::DimensionMismatch {
                document: self.document_id.to_string(),
                expected: model.dimension,
                found: self.dimension,
            });
        }
        if self.model.model_id() != model.model_id() {
            return Err(RetrievalError::ModelMismatch {
                document: self.document_id.to_string(),
                expected: model.model_id(),
                found: self.model.model_id(),
            });
        }
        Ok(())
    }
}

/// Storage backend for built document indexes.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Persist both artifacts of an index, replacing any previous version
    async fn save(&self, index: &DocumentIndex) -> Result<()>;

    /// Load an index, verifying it was built by `model`
    async fn load(
        &self,
        document_id: &DocumentId,
        model: &EmbeddingModelMetadata,
    ) -> Result<DocumentIndex>;

    /// Read only the header of a stored index
    async fn header(&self, document_id: &DocumentId) -> Result<IndexHeader>;

    /// Whether both artifacts exist for the document
    async fn exists(&self, document_id: &DocumentId) -> Result<bool>;

    /// Remove a stored index, returning whether anything was deleted
    async fn delete(&self, document_id: &DocumentId) -> Result<bool>;

    /// All stored documents, sorted by id
    async fn list(&self) -> Result<Vec<DocumentId>>;
}
