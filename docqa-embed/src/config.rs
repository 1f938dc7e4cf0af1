//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sentence-embedding model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Output dimension of the feature-hashing provider when none is configured.
pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local ONNX sentence-embedding models via fastembed
    #[default]
    FastEmbed,
    /// Deterministic feature hashing, no model download
    Hash,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::FastEmbed => "fastembed",
            ProviderKind::Hash => "hash",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fastembed" => Ok(ProviderKind::FastEmbed),
            "hash" => Ok(ProviderKind::Hash),
            _ => Err(EmbedError::invalid_config(format!(
                "unknown embedding provider: {s}"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for embedding models
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    #[builder(default = "DEFAULT_MODEL.to_string()")]
    pub model_name: String,
    /// Backend that produces the embeddings
    #[builder(default)]
    pub provider: ProviderKind,
    /// Maximum batch size for embedding generation
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    #[builder(default = "true")]
    pub normalize: bool,
    /// Directory fastembed downloads models into (its own default when unset)
    #[builder(default)]
    pub cache_dir: Option<PathBuf>,
    /// Expected output dimension; required size for the hash provider
    #[builder(default)]
    pub dimension: Option<usize>,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a fastembed configuration for the named model
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Create a feature-hashing configuration with the given dimension
    pub fn hashing(dimension: usize) -> Self {
        Self {
            model_name: format!("feature-hash-{dimension}"),
            provider: ProviderKind::Hash,
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model download directory (builder style)
    pub fn with_cache_dir(self, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: Some(cache_dir.into()),
            ..self
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolve the configured name to a built-in fastembed model.
    pub fn fastembed_model(&self) -> Result<EmbeddingModel> {
        match self.model_name.as_str() {
            "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                Ok(EmbeddingModel::AllMiniLML6V2)
            }
            "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
                Ok(EmbeddingModel::AllMiniLML12V2)
            }
            "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" | "BAAI/bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
                Ok(EmbeddingModel::NomicEmbedTextV15)
            }
            "snowflake-arctic-embed-xs" | "Snowflake/snowflake-arctic-embed-xs" => {
                Ok(EmbeddingModel::SnowflakeArcticEmbedXS)
            }
            other => Err(EmbedError::UnknownModel {
                name: other.to_string(),
                provider: ProviderKind::FastEmbed.to_string(),
            }),
        }
    }

    /// Validate settings that do not require loading the model
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be positive"));
        }
        if self.dimension == Some(0) {
            return Err(EmbedError::invalid_config("dimension must be positive"));
        }
        match self.provider {
            ProviderKind::FastEmbed => {
                self.fastembed_model()?;
            }
            ProviderKind::Hash => {}
        }
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            provider: ProviderKind::FastEmbed,
            batch_size: 32,
            normalize: true,
            cache_dir: None,
            dimension: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();

        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.provider, ProviderKind::FastEmbed);
        assert_eq!(config.batch_size, 32);
        assert!(config.normalize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_methods() {
        let temp_dir = tempdir().unwrap();
        let config = EmbedConfig::new("bge-small-en-v1.5")
            .with_batch_size(64)
            .with_normalize(false)
            .with_cache_dir(temp_dir.path());

        assert_eq!(config.batch_size, 64);
        assert!(!config.normalize);
        assert_eq!(config.cache_dir.as_deref(), Some(temp_dir.path()));
        assert!(matches!(
            config.fastembed_model(),
            Ok(EmbeddingModel::BGESmallENV15)
        ));
    }

    #[test]
    fn test_derive_builder_pattern() {
        let config = EmbedConfig::builder()
            .model_name("feature-hash-64")
            .provider(ProviderKind::Hash)
            .dimension(64usize)
            .batch_size(8usize)
            .build()
            .unwrap();

        assert_eq!(config.provider, ProviderKind::Hash);
        assert_eq!(config.dimension, Some(64));
        assert_eq!(config.batch_size, 8);
        assert!(config.normalize);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let config = EmbedConfig::new("gpt-embedding-9000");
        assert!(matches!(
            config.validate(),
            Err(EmbedError::UnknownModel { .. })
        ));

        // Model names are not interpreted by the hash provider
        let mut hashing = EmbedConfig::hashing(32);
        hashing.model_name = "anything".to_string();
        assert!(hashing.validate().is_ok());
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(EmbedConfig::default().with_batch_size(0).validate().is_err());
        assert!(EmbedConfig::hashing(0).validate().is_err());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: EmbedConfig = serde_json::from_str(r#"{"provider": "hash"}"#).unwrap();
        assert_eq!(config.provider, ProviderKind::Hash);
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.batch_size, 32);
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("FastEmbed".parse::<ProviderKind>().unwrap(), ProviderKind::FastEmbed);
        assert_eq!("hash".parse::<ProviderKind>().unwrap(), ProviderKind::Hash);
        assert!("openai".parse::<ProviderKind>().is_err());
    }
}
