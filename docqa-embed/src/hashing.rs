//! Deterministic feature-hashing embeddings.
//!
//! [`HashEmbedProvider`] maps text to a bag-of-words vector: every lowercase
//! alphanumeric token is hashed with FNV-1a into one of `dimension` buckets and
//! counted. It needs no model files, so it is used for offline runs and tests
//! where exact, reproducible vectors matter more than semantic quality.

use crate::config::{DEFAULT_HASH_DIMENSION, DEFAULT_MODEL, EmbedConfig, ProviderKind};
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingResult, normalize_l2};
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    model_name: String,
    dimension: usize,
    normalize: bool,
}

impl HashEmbedProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_name: format!("feature-hash-{dimension}"),
            dimension: dimension.max(1),
            normalize: true,
        }
    }

    /// The fastembed default name is replaced with `feature-hash-{dimension}`.
    pub fn from_config(config: &EmbedConfig) -> Self {
        let dimension = config.dimension.unwrap_or(DEFAULT_HASH_DIMENSION).max(1);
        let model_name = if config.model_name == DEFAULT_MODEL {
            format!("feature-hash-{dimension}")
        } else {
            config.model_name.clone()
        };
        Self {
            model_name,
            dimension,
            normalize: config.normalize,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Lowercase alphanumeric runs of `text`.
    pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = FnvHasher::default();
        hasher.write(token.as_bytes());
        (hasher.finish() % self.dimension as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f16> {
        let mut counts = vec![0.0f32; self.dimension];
        for token in Self::tokenize(text) {
            counts[self.bucket(&token)] += 1.0;
        }
        if self.normalize {
            normalize_l2(&mut counts);
        }
        counts.into_iter().map(f16::from_f32).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        Ok(self.embed_one(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }
        tracing::debug!("Hashing {} texts into {} buckets", texts.len(), self.dimension);
        Ok(EmbeddingResult::new(
            texts.iter().map(|text| self.embed_one(text)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        ProviderKind::Hash.as_str()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn normalized(&self) -> bool {
        self.normalize
    }
}
