//! In-memory index store for tests and ephemeral sessions.

use crate::error::{Result, RetrievalError};
use crate::retrieval::{DocumentId, DocumentIndex};
use crate::storage::codec::{self, EncodedIndex};
use crate::storage::{IndexHeader, IndexStore};
use async_trait::async_trait;
use docqa_embed::EmbeddingModelMetadata;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Keeps encoded artifacts in a map.
///
/// Indexes go through the same codec as [`crate::storage::FileStore`], so
/// model checks and corruption handling behave identically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    indexes: RwLock<BTreeMap<DocumentId, EncodedIndex>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.indexes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.indexes.read().await.is_empty()
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn save(&self, index: &DocumentIndex) -> Result<()> {
        let encoded = codec::encode_index(index)?;
        self.indexes
            .write()
            .await
            .insert(index.document_id().clone(), encoded);
        Ok(())
    }

    async fn load(
        &self,
        document_id: &DocumentId,
        model: &EmbeddingModelMetadata,
    ) -> Result<DocumentIndex> {
        let indexes = self.indexes.read().await;
        let encoded = indexes
            .get(document_id)
            .ok_or_else(|| RetrievalError::not_found(document_id.as_str()))?;
        codec::decode_index(document_id, encoded, model)
    }

    async fn header(&self, document_id: &DocumentId) -> Result<IndexHeader> {
        let indexes = self.indexes.read().await;
        let encoded = indexes
            .get(document_id)
            .ok_or_else(|| RetrievalError::not_found(document_id.as_str()))?;
        let (header, _) = codec::decode_header(document_id, &encoded.vectors)?;
        Ok(header)
    }

    async fn exists(&self, document_id: &DocumentId) -> Result<bool> {
        Ok(self.indexes.read().await.contains_key(document_id))
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<bool> {
        Ok(self.indexes.write().await.remove(document_id).is_some())
    }

    async fn list(&self) -> Result<Vec<DocumentId>> {
        Ok(self.indexes.read().await.keys().cloned().collect())
    }
}
