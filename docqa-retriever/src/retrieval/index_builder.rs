//! Turns a document's chunks into a persisted [`DocumentIndex`].

use crate::error::{Result, RetrievalError};
use crate::retrieval::retry::retry_once;
use crate::retrieval::{DocumentId, DocumentIndex, IndexEntry};
use crate::storage::IndexStore;
use docqa_context::Chunk;
use docqa_embed::{EmbedError, EmbeddingProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Embeds chunks with one provider and saves the result to one store.
#[derive(Clone)]
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn IndexStore>,
}

impl IndexBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn IndexStore>) -> Self {
        Self { provider, store }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Embed every chunk and persist the index.
    ///
    /// Either the whole index is built and saved, or nothing is written.
    /// An empty chunk list is rejected with [`RetrievalError::EmptyDocument`].
    pub async fn build(
        &self,
        document_id: DocumentId,
        source_name: &str,
        chunks: Vec<Chunk>,
    ) -> Result<DocumentIndex> {
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyDocument {
                document: source_name.to_string(),
            });
        }

        let start = Instant::now();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings =
            retry_once("Embedding document chunks", || self.provider.embed_texts(&texts)).await?;

        if embeddings.len() != chunks.len() {
            return Err(EmbedError::embedding_gen(format!(
                "provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            ))
            .into());
        }

        let model = self.provider.model_metadata();
        let entries = chunks
            .into_iter()
            .zip(embeddings.embeddings)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();
        let index = DocumentIndex::new(document_id, source_name, model, entries)?;

        self.store.save(&index).await?;

        info!(
            "Indexed {} chunks of '{}' as {} in {:.2?}",
            index.len(),
            source_name,
            index.document_id(),
            start.elapsed()
        );
        Ok(index)
    }
}
