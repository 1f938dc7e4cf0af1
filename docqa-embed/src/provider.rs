//! Embedding provider implementations

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{EmbedError, Result};
use crate::hashing::HashEmbedProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector and is 0 for
    /// an empty result.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Identity of the model that produced a set of embeddings.
///
/// Vectors are only comparable when their metadata matches, so every document
/// index records the metadata of the provider that built it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModelMetadata {
    /// Name of the embedding model (e.g., "all-MiniLM-L6-v2")
    pub model_name: String,
    /// Provider of the embedding model (e.g., "fastembed")
    pub provider: String,
    /// Dimension of the embedding vectors
    pub dimension: usize,
    /// Whether embeddings are L2-normalized
    pub normalized: bool,
}

impl EmbeddingModelMetadata {
    pub fn new(model_name: String, provider: String, dimension: usize) -> Self {
        Self {
            model_name,
            provider,
            dimension,
            normalized: false,
        }
    }

    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Create a unique identifier for this model configuration
    pub fn model_id(&self) -> String {
        let normalized_part = if self.normalized { "norm" } else { "raw" };
        format!(
            "{}:{}:{}:{}",
            self.provider, self.model_name, self.dimension, normalized_part
        )
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Name of the loaded model
    fn model_name(&self) -> &str;

    /// Whether output vectors are L2-normalized
    fn normalized(&self) -> bool;

    /// Identity of the model behind this provider
    fn model_metadata(&self) -> EmbeddingModelMetadata {
        EmbeddingModelMetadata::new(
            self.model_name().to_string(),
            self.provider_name().to_string(),
            self.embedding_dimension(),
        )
        .with_normalized(self.normalized())
    }
}

/// Scale `values` to unit L2 norm in place. Zero vectors are left untouched.
pub fn normalize_l2(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

/// Output size of the default model, reported until a model is loaded.
const UNLOADED_DIMENSION: usize = 384;

/// A loaded model and its probed output dimension.
#[derive(Clone)]
struct SharedModel {
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

/// Models loaded by this process, keyed by [`FastEmbedProvider::create_cache_key`].
static LOADED_MODELS: OnceLock<Mutex<HashMap<String, SharedModel>>> = OnceLock::new();

fn loaded_models() -> MutexGuard<'static, HashMap<String, SharedModel>> {
    LOADED_MODELS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Blocking: fetch (if needed) and load the ONNX model, then probe its dimension.
fn load_model(config: &EmbedConfig, kind: EmbeddingModel) -> Result<SharedModel> {
    tracing::info!("Loading fastembed model {}", config.model_name());

    let mut options = InitOptions::new(kind).with_show_download_progress(false);
    if let Some(cache_dir) = &config.cache_dir {
        options = options.with_cache_dir(cache_dir.clone());
    }
    let mut model = TextEmbedding::try_new(options).map_err(EmbedError::model_init)?;

    let probe = model
        .embed(vec!["dimension probe"], None)
        .map_err(EmbedError::model_init)?;
    let dimension = probe
        .first()
        .map(Vec::len)
        .filter(|len| *len > 0)
        .ok_or_else(|| EmbedError::model_init("model returned an empty probe embedding"))?;

    tracing::info!("Loaded {} ({} dimensions)", config.model_name(), dimension);
    Ok(SharedModel {
        model: Arc::new(Mutex::new(model)),
        dimension,
    })
}

/// Sentence embeddings from a local fastembed (ONNX) model.
///
/// Loading is expensive, so models are kept in a process-wide table and every
/// provider created with the same model identity shares one instance.
/// Inference runs on the blocking thread pool.
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<SharedModel>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("loaded", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// A provider with no model loaded yet; see [`FastEmbedProvider::initialize`].
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config.dimension.unwrap_or(UNLOADED_DIMENSION);
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        let key = self.create_cache_key();

        let cached = loaded_models().get(&key).cloned();
        let shared = match cached {
            Some(shared) => {
                tracing::info!("Reusing loaded model {}", self.config.model_name());
                shared
            }
            None => {
                let kind = self.config.fastembed_model()?;
                let config = self.config.clone();
                let shared =
                    tokio::task::spawn_blocking(move || load_model(&config, kind)).await??;

                if let Some(expected) = self.config.dimension {
                    if expected != shared.dimension {
                        return Err(EmbedError::invalid_config(format!(
                            "model {} produces {}-dimensional embeddings, configured dimension is {}",
                            self.config.model_name(),
                            shared.dimension,
                            expected
                        )));
                    }
                }

                loaded_models()
                    .entry(key)
                    .or_insert_with(|| shared.clone())
                    .clone()
            }
        };

        self.dimension = shared.dimension;
        self.model = Some(shared);
        self.validate_model().await
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Identity of the loaded weights. Batch size and normalization are
    /// applied after inference and do not take part.
    fn create_cache_key(&self) -> String {
        let mut hasher = FnvHasher::default();
        hasher.write(self.config.model_name.as_bytes());
        hasher.write_u8(0);
        if let Some(cache_dir) = &self.config.cache_dir {
            hasher.write(cache_dir.as_os_str().as_encoded_bytes());
        }
        hasher.write_u8(0);
        hasher.write_usize(self.config.dimension.unwrap_or(0));
        format!("v1:{:x}", hasher.finish())
    }

    /// Run one batch through the model on the blocking pool.
    async fn embed_batch(&self, batch: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let shared = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("fastembed model is not loaded; call initialize() first")
        })?;
        let model = Arc::clone(&shared.model);

        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            model.embed(batch, None).map_err(EmbedError::embedding_gen)
        })
        .await?
    }

    /// Reject a model that does not return one finite vector of the expected size.
    async fn validate_model(&self) -> Result<()> {
        let probe = self.embed_batch(vec!["validation probe".to_string()]).await?;
        let valid = probe.len() == 1
            && probe[0].len() == self.dimension
            && probe[0].iter().all(|value| value.is_finite());
        if !valid {
            return Err(EmbedError::model_init(format!(
                "model {} failed validation: expected one finite {}-dimensional embedding",
                self.config.model_name(),
                self.dimension
            )));
        }

        tracing::debug!("Validated model {}", self.config.model_name());
        Ok(())
    }

    /// Forget every loaded model. Existing providers keep their instance.
    pub fn clear_cache() {
        loaded_models().clear();
        tracing::info!("Cleared loaded fastembed models");
    }

    pub fn cache_size() -> usize {
        loaded_models().len()
    }

    fn to_half(&self, mut embedding: Vec<f32>) -> Vec<f16> {
        if self.config.normalize {
            normalize_l2(&mut embedding);
        }
        embedding.into_iter().map(f16::from_f32).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        self.embed_texts(&[text.to_string()])
            .await?
            .embeddings
            .pop()
            .ok_or_else(|| EmbedError::embedding_gen("model returned no embedding for the text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(Vec::new()));
        }

        let batch_size = self.config.batch_size.max(1);
        tracing::debug!(
            "Embedding {} texts in batches of {}",
            texts.len(),
            batch_size
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let raw = self.embed_batch(batch.to_vec()).await?;
            embeddings.extend(raw.into_iter().map(|embedding| self.to_half(embedding)));
        }

        if embeddings.len() != texts.len() {
            return Err(EmbedError::embedding_gen(format!(
                "model returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        ProviderKind::FastEmbed.as_str()
    }

    fn model_name(&self) -> &str {
        self.config.model_name()
    }

    fn normalized(&self) -> bool {
        self.config.normalize
    }
}

/// Construct the provider selected by `config`, shared behind an `Arc`.
///
/// The returned handle is meant to be created once and passed to every
/// component that embeds text, so the model is loaded a single time.
pub async fn create_provider(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    match config.provider {
        ProviderKind::FastEmbed => {
            let provider = FastEmbedProvider::create(config.clone()).await?;
            Ok(Arc::new(provider))
        }
        ProviderKind::Hash => Ok(Arc::new(HashEmbedProvider::from_config(config))),
    }
}
