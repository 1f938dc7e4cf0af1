//! Query-time search over a single document index.

use crate::error::{Result, RetrievalError};
use crate::retrieval::retry::retry_once;
use crate::retrieval::{DocumentIndex, SearchHit};
use crate::storage::IndexHeader;
use docqa_context::Chunk;
use docqa_embed::EmbeddingProvider;
use std::sync::Arc;
use tracing::debug;

/// Number of chunks returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 6;

/// Binds one document index to the provider that embeds queries for it.
///
/// Construction fails if the provider is not the model the index was built
/// with, so every query is compared in the vector space of its document.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<DocumentIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    default_top_k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("document_id", self.index.document_id())
            .field("model", &self.index.model().model_id())
            .field("default_top_k", &self.default_top_k)
            .finish()
    }
}

impl Retriever {
    pub fn new(
        index: Arc<DocumentIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        default_top_k: usize,
    ) -> Result<Self> {
        if default_top_k == 0 {
            return Err(RetrievalError::configuration("top_k must be positive"));
        }
        IndexHeader::for_index(&index).check_compatible(&provider.model_metadata())?;

        Ok(Self {
            index,
            provider,
            default_top_k,
        })
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// The `top_k` chunks nearest to `query`, closest first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .search_with_scores(query, top_k)
            .await?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect())
    }

    /// Search with the configured default result count.
    pub async fn search_default(&self, query: &str) -> Result<Vec<Chunk>> {
        self.search(query, self.default_top_k).await
    }

    /// Like [`Retriever::search`] but keeps positions and distances.
    pub async fn search_with_scores(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RetrievalError::configuration("top_k must be positive"));
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector =
            retry_once("Embedding query", || self.provider.embed_text(query)).await?;
        let query_vector: Vec<f32> = query_vector.iter().map(|v| v.to_f32()).collect();

        let hits = self.index.search_vector(&query_vector, top_k)?;
        debug!(
            "Query matched {} of {} chunks in {}",
            hits.len(),
            self.index.len(),
            self.index.document_id()
        );
        Ok(hits)
    }
}

/// Render retrieved chunks as the context block handed to an answer generator.
///
/// Each chunk becomes `(Page N) content`, separated by blank lines.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("(Page {}) {}", chunk.page, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{DocumentId, IndexBuilder};
    use crate::storage::MemoryStore;
    use docqa_context::ChunkKind;
    use docqa_embed::HashEmbedProvider;

    async fn build(provider: Arc<dyn EmbeddingProvider>, chunks: Vec<Chunk>) -> Arc<DocumentIndex> {
        let builder = IndexBuilder::new(provider, Arc::new(MemoryStore::new()));
        let id = DocumentId::parse("report-0000000000000001").unwrap();
        Arc::new(builder.build(id, "report.pdf", chunks).await.unwrap())
    }

    fn report() -> Vec<Chunk> {
        vec![
            Chunk::new(1, ChunkKind::Text, "Revenue grew 12%."),
            Chunk::new(2, ChunkKind::Text, "Risks include FX exposure."),
            Chunk::new(3, ChunkKind::Text, "Outlook remains positive."),
        ]
    }

    #[tokio::test]
    async fn test_search_ranks_relevant_chunk_first() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedProvider::new(384));
        let index = build(provider.clone(), report()).await;
        let retriever = Retriever::new(index, provider, 6).unwrap();

        let results = retriever.search("What risks exist?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].page, 2);
        assert_eq!(results[0].content, "Risks include FX exposure.");
        // Remaining chunks are equidistant; document order breaks the tie
        assert_eq!(results[1].page, 1);
    }

    #[tokio::test]
    async fn test_default_top_k_caps_at_index_size() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedProvider::new(64));
        let index = build(provider.clone(), report()).await;
        let retriever = Retriever::new(index, provider, 6).unwrap();

        let results = retriever.search_default("revenue").await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_results_are_deterministic() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedProvider::new(64));
        let index = build(provider.clone(), report()).await;
        let retriever = Retriever::new(index, provider, 6).unwrap();

        let first = retriever.search_with_scores("outlook risks", 3).await.unwrap();
        let second = retriever.search_with_scores("outlook risks", 3).await.unwrap();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedProvider::new(8));
        let index = build(provider.clone(), report()).await;

        assert!(matches!(
            Retriever::new(index.clone(), provider.clone(), 0),
            Err(RetrievalError::Configuration { .. })
        ));
        let retriever = Retriever::new(index, provider, 6).unwrap();
        assert!(matches!(
            retriever.search("x", 0).await,
            Err(RetrievalError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_must_match_index_model() {
        let index = build(Arc::new(HashEmbedProvider::new(8)), report()).await;

        let wider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedProvider::new(16));
        assert!(matches!(
            Retriever::new(index.clone(), wider, 6),
            Err(RetrievalError::DimensionMismatch {
                expected: 16,
                found: 8,
                ..
            })
        ));

        let raw: Arc<dyn EmbeddingProvider> =
            Arc::new(HashEmbedProvider::new(8).with_normalize(false));
        assert!(matches!(
            Retriever::new(index, raw, 6),
            Err(RetrievalError::ModelMismatch { .. })
        ));
    }

    #[test]
    fn test_format_context() {
        let chunks = vec![
            Chunk::new(2, ChunkKind::Text, "Risks include FX exposure."),
            Chunk::new(1, ChunkKind::Ocr, "Revenue grew 12%."),
        ];
        assert_eq!(
            format_context(&chunks),
            "(Page 2) Risks include FX exposure.\n\n(Page 1) Revenue grew 12%."
        );
        assert_eq!(format_context(&[]), "");
    }
}
