//! The in-memory searchable form of one document.

use crate::error::{Result, RetrievalError};
use crate::retrieval::DocumentId;
use chrono::{DateTime, Utc};
use docqa_context::Chunk;
use docqa_embed::EmbeddingModelMetadata;
use half::f16;

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f16>,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Position of the chunk in the index (document order)
    pub position: usize,
    /// Squared Euclidean distance to the query; smaller is closer
    pub distance: f32,
    pub chunk: Chunk,
}

/// Vectors and chunk metadata for a single document.
///
/// Position `i` of the vector store corresponds to chunk `i`, and that
/// correspondence is fixed at construction. The index is immutable afterwards
/// and is shared behind an `Arc` by readers.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    document_id: DocumentId,
    source_name: String,
    model: EmbeddingModelMetadata,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl DocumentIndex {
    pub fn new(
        document_id: DocumentId,
        source_name: impl Into<String>,
        model: EmbeddingModelMetadata,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        Self::with_timestamp(document_id, source_name, model, Utc::now(), entries)
    }

    /// Reassemble an index from separately stored chunks and vectors.
    pub fn from_parts(
        document_id: DocumentId,
        source_name: impl Into<String>,
        model: EmbeddingModelMetadata,
        created_at: DateTime<Utc>,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f16>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RetrievalError::corrupt(
                document_id.as_str(),
                format!(
                    "{} chunks but {} vectors",
                    chunks.len(),
                    vectors.len()
                ),
            ));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Self::with_timestamp(document_id, source_name, model, created_at, entries)
    }

    fn with_timestamp(
        document_id: DocumentId,
        source_name: impl Into<String>,
        model: EmbeddingModelMetadata,
        created_at: DateTime<Utc>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != model.dimension) {
            return Err(RetrievalError::DimensionMismatch {
                document: document_id.to_string(),
                expected: model.dimension,
                found: bad.vector.len(),
            });
        }

        Ok(Self {
            document_id,
            source_name: source_name.into(),
            model,
            created_at,
            entries,
        })
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn model(&self) -> &EmbeddingModelMetadata {
        &self.model
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f16]> {
        self.entries.iter().map(|e| e.vector.as_slice())
    }

    /// Exhaustive nearest-neighbour search.
    ///
    /// Returns at most `top_k` hits ordered by ascending squared L2 distance.
    /// Equal distances keep document order.
    pub fn search_vector(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                document: self.document_id.to_string(),
                expected: self.dimension(),
                found: query.len(),
            });
        }
        if top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, squared_l2(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                position,
                distance,
                chunk: self.entries[position].chunk.clone(),
            })
            .collect())
    }
}

/// Squared Euclidean distance, accumulated in f32.
pub fn squared_l2(query: &[f32], vector: &[f16]) -> f32 {
    query
        .iter()
        .zip(vector)
        .map(|(q, v)| {
            let d = q - v.to_f32();
            d * d
        })
        .sum()
}
