//! Runtime configuration.
//!
//! Settings come from built-in defaults, then an optional TOML file, then
//! `DOCQA_*` environment variables, each layer overriding the previous one:
//!
//! ```toml
//! top_k = 6
//! index_dir = "vector_store"
//!
//! [embedding]
//! provider = "fastembed"
//! model_name = "all-MiniLM-L6-v2"
//!
//! [chunking]
//! chunk_size = 500
//! chunk_overlap = 100
//! text_policy = "sliding_window"
//! ocr_policy = "sliding_window"
//! ```

use crate::error::{Result, RetrievalError};
use crate::retrieval::DEFAULT_TOP_K;
use docqa_context::ChunkingConfig;
use docqa_embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_INDEX_DIR: &str = "vector_store";

pub const ENV_EMBEDDING_MODEL: &str = "DOCQA_EMBEDDING_MODEL";
pub const ENV_EMBEDDING_PROVIDER: &str = "DOCQA_EMBEDDING_PROVIDER";
pub const ENV_CHUNK_SIZE: &str = "DOCQA_CHUNK_SIZE";
pub const ENV_CHUNK_OVERLAP: &str = "DOCQA_CHUNK_OVERLAP";
pub const ENV_TOP_K: &str = "DOCQA_TOP_K";
pub const ENV_INDEX_DIR: &str = "DOCQA_INDEX_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub embedding: EmbedConfig,
    pub chunking: ChunkingConfig,
    /// Chunks returned per query when the caller does not specify a count
    pub top_k: usize,
    /// Directory holding persisted document indexes
    pub index_dir: PathBuf,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            embedding: EmbedConfig::default(),
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
        }
    }
}

impl RetrieverConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Defaults, optional file, process environment; validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCQA_*` overrides supplied by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup(ENV_EMBEDDING_PROVIDER) {
            self.embedding.provider = provider.parse().map_err(|e: docqa_embed::EmbedError| {
                RetrievalError::configuration(e.to_string())
            })?;
        }
        if let Some(model) = lookup(ENV_EMBEDDING_MODEL) {
            self.embedding.model_name = model;
        }
        if let Some(size) = lookup(ENV_CHUNK_SIZE) {
            self.chunking.chunk_size = parse_setting(ENV_CHUNK_SIZE, &size)?;
        }
        if let Some(overlap) = lookup(ENV_CHUNK_OVERLAP) {
            self.chunking.chunk_overlap = parse_setting(ENV_CHUNK_OVERLAP, &overlap)?;
        }
        if let Some(top_k) = lookup(ENV_TOP_K) {
            self.top_k = parse_setting(ENV_TOP_K, &top_k)?;
        }
        if let Some(dir) = lookup(ENV_INDEX_DIR) {
            self.index_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RetrievalError::configuration("top_k must be positive"));
        }
        if self.index_dir.as_os_str().is_empty() {
            return Err(RetrievalError::configuration("index_dir must not be empty"));
        }
        self.chunking
            .validate()
            .map_err(|e| RetrievalError::configuration(e.to_string()))?;
        self.embedding
            .validate()
            .map_err(|e| RetrievalError::configuration(e.to_string()))?;
        Ok(())
    }
}

fn parse_setting<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RetrievalError::configuration(format!("{key} has invalid value {value:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_context::ChunkPolicy;
    use docqa_embed::ProviderKind;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RetrieverConfig::default();
        assert_eq!(config.top_k, 6);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.index_dir, PathBuf::from("vector_store"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = RetrieverConfig::from_toml_str(
            r#"
            top_k = 3

            [embedding]
            provider = "hash"
            dimension = 128

            [chunking]
            ocr_policy = "whole_page"
            "#,
        )
        .unwrap();

        assert_eq!(config.top_k, 3);
        assert_eq!(config.embedding.provider, ProviderKind::Hash);
        assert_eq!(config.embedding.dimension, Some(128));
        assert_eq!(config.chunking.ocr_policy, ChunkPolicy::WholePage);
        assert_eq!(config.chunking.text_policy, ChunkPolicy::SlidingWindow);
        assert_eq!(config.chunking.chunk_size, 500);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = RetrieverConfig::from_toml_str("top_k = 3").unwrap();
        config
            .apply_overrides(env(&[
                (ENV_TOP_K, "9"),
                (ENV_CHUNK_SIZE, "200"),
                (ENV_CHUNK_OVERLAP, "20"),
                (ENV_EMBEDDING_PROVIDER, "hash"),
                (ENV_INDEX_DIR, "/tmp/indexes"),
            ]))
            .unwrap();

        assert_eq!(config.top_k, 9);
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.chunking.chunk_overlap, 20);
        assert_eq!(config.embedding.provider, ProviderKind::Hash);
        assert_eq!(config.index_dir, PathBuf::from("/tmp/indexes"));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = RetrieverConfig::default();
        assert!(matches!(
            config.apply_overrides(env(&[(ENV_TOP_K, "six")])),
            Err(RetrievalError::Configuration { .. })
        ));
        assert!(config.apply_overrides(env(&[(ENV_EMBEDDING_PROVIDER, "openai")])).is_err());

        let overlapping = RetrieverConfig {
            chunking: ChunkingConfig::default().with_chunk_overlap(500),
            ..RetrieverConfig::default()
        };
        assert!(matches!(
            overlapping.validate(),
            Err(RetrievalError::Configuration { .. })
        ));

        let zero = RetrieverConfig {
            top_k: 0,
            ..RetrieverConfig::default()
        };
        assert!(zero.validate().is_err());

        assert!(matches!(
            RetrieverConfig::from_toml_str("top_k = \"many\""),
            Err(RetrievalError::Toml { .. })
        ));
    }
}
