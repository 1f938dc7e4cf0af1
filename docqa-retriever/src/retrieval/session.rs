//! The single active document a user is asking questions about.
//!
//! A session holds at most one searchable document. Uploading a new document
//! replaces the previous one; there is no way to search across documents, and
//! the previous document's chunks are never returned once a newer upload has
//! been installed.
//!
//! Uploads are versioned with a generation counter. When a build finishes
//! after a newer upload (or open) has started, its result is discarded with
//! [`RetrievalError::Superseded`] instead of overwriting the newer document.
//! A failed upload leaves the previously active document in place.

use crate::config::RetrieverConfig;
use crate::error::{Result, RetrievalError};
use crate::retrieval::{DocumentId, DocumentIndex, IndexBuilder, Retriever, SearchHit};
use crate::storage::IndexStore;
use docqa_context::{Chunk, Chunker, ChunkingConfig, PageText};
use docqa_embed::EmbeddingProvider;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A document that has been indexed and bound to a retriever.
#[derive(Debug)]
pub struct ActiveDocument {
    retriever: Retriever,
    reused: bool,
}

impl ActiveDocument {
    pub fn document_id(&self) -> &DocumentId {
        self.retriever.index().document_id()
    }

    pub fn source_name(&self) -> &str {
        self.retriever.index().source_name()
    }

    pub fn chunk_count(&self) -> usize {
        self.retriever.index().len()
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        self.retriever.index()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Whether the index was loaded from the store instead of rebuilt
    pub fn reused(&self) -> bool {
        self.reused
    }
}

pub struct DocumentSession {
    chunker: Chunker,
    builder: IndexBuilder,
    default_top_k: usize,
    generation: AtomicU64,
    active: RwLock<Option<Arc<ActiveDocument>>>,
}

impl DocumentSession {
    pub fn new(
        chunking: ChunkingConfig,
        default_top_k: usize,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self> {
        if default_top_k == 0 {
            return Err(RetrievalError::configuration("top_k must be positive"));
        }
        let chunker = Chunker::new(chunking)
            .map_err(|e| RetrievalError::configuration(e.to_string()))?;

        Ok(Self {
            chunker,
            builder: IndexBuilder::new(provider, store),
            default_top_k,
            generation: AtomicU64::new(0),
            active: RwLock::new(None),
        })
    }

    pub fn from_config(
        config: &RetrieverConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self> {
        config.validate()?;
        Self::new(config.chunking.clone(), config.top_k, provider, store)
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        self.builder.provider()
    }

    fn store(&self) -> &Arc<dyn IndexStore> {
        self.builder.store()
    }

    /// Chunk, embed, persist and activate a document.
    ///
    /// If the store already holds an index for identical content, built by the
    /// same model with the same chunks, it is reused without re-embedding.
    pub async fn upload(
        &self,
        source_name: &str,
        pages: &[PageText],
    ) -> Result<Arc<ActiveDocument>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let document_id = DocumentId::derive(source_name, pages);

        let chunks = self.chunker.chunk_pages(pages)?;
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyDocument {
                document: source_name.to_string(),
            });
        }

        let (index, reused) = match self.reusable_index(&document_id, &chunks).await? {
            Some(index) => (index, true),
            None => (
                self.builder
                    .build(document_id.clone(), source_name, chunks)
                    .await?,
                false,
            ),
        };

        self.install(generation, index, reused).await
    }

    /// Activate a previously persisted document.
    pub async fn open(&self, document_id: &DocumentId) -> Result<Arc<ActiveDocument>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let index = self
            .store()
            .load(document_id, &self.provider().model_metadata())
            .await?;
        self.install(generation, index, true).await
    }

    async fn reusable_index(
        &self,
        document_id: &DocumentId,
        chunks: &[Chunk],
    ) -> Result<Option<DocumentIndex>> {
        match self
            .store()
            .load(document_id, &self.provider().model_metadata())
            .await
        {
            Ok(index) if index.chunks().eq(chunks.iter()) => {
                info!("Reusing stored index for {}", document_id);
                Ok(Some(index))
            }
            Ok(_) => {
                info!("Stored index for {} used different chunking; rebuilding", document_id);
                Ok(None)
            }
            Err(RetrievalError::IndexNotFound { .. }) => Ok(None),
            Err(e) if e.is_stale_index() => {
                warn!("Stored index for {} is unusable ({}); rebuilding", document_id, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn install(
        &self,
        generation: u64,
        index: DocumentIndex,
        reused: bool,
    ) -> Result<Arc<ActiveDocument>> {
        let retriever = Retriever::new(
            Arc::new(index),
            self.provider().clone(),
            self.default_top_k,
        )?;

        let mut active = self.active.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            let document = retriever.index().source_name().to_string();
            warn!("Discarding index for '{}': superseded by a newer upload", document);
            return Err(RetrievalError::Superseded { document });
        }

        let document = Arc::new(ActiveDocument { retriever, reused });
        info!(
            "Active document is now '{}' ({}, {} chunks)",
            document.source_name(),
            document.document_id(),
            document.chunk_count()
        );
        *active = Some(document.clone());
        Ok(document)
    }

    pub async fn active_document(&self) -> Option<Arc<ActiveDocument>> {
        self.active.read().await.clone()
    }

    async fn require_active(&self) -> Result<Arc<ActiveDocument>> {
        self.active_document()
            .await
            .ok_or(RetrievalError::IndexNotFound { document: None })
    }

    /// Search the active document; `None` uses the configured default count.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<Chunk>> {
        let document = self.require_active().await?;
        let retriever = document.retriever();
        retriever
            .search(query, top_k.unwrap_or(retriever.default_top_k()))
            .await
    }

    pub async fn search_with_scores(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let document = self.require_active().await?;
        let retriever = document.retriever();
        retriever
            .search_with_scores(query, top_k.unwrap_or(retriever.default_top_k()))
            .await
    }

    /// Drop the active document and abandon any in-flight upload.
    pub async fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.active.write().await = None;
    }
}
