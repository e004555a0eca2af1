//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, a local implementation using
//! all-MiniLM-L6-v2 (384 dimensions, L2-normalized), a bounded cache wrapper,
//! and a disabled provider used when no model is installed. The provider is
//! created via [`create_provider`] from configuration.

pub mod cache;
pub mod local;

use std::sync::Arc;

use anyhow::Result;

use crate::config::EmbeddingConfig;
use crate::error::MemoryError;

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Models the local provider knows how to run.
const LOCAL_MODELS: &[&str] = &["all-MiniLM-L6-v2"];

/// Trait for embedding text into vectors.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Whether the backend can serve requests right now.
    fn is_available(&self) -> bool {
        true
    }

    /// Identifier of the model producing the vectors.
    fn model(&self) -> &str;

    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. A `None` slot means that item could not be
    /// embedded; callers treat it as "no embedding", not as a failure.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Option<Vec<f32>>>> {
        Ok(texts.iter().map(|t| self.embed(t).ok()).collect())
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Stand-in used when no embedding backend could be loaded. Reports itself
/// unavailable so optional stages skip instead of failing.
pub struct DisabledEmbeddingProvider {
    reason: String,
}

impl DisabledEmbeddingProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl EmbeddingProvider for DisabledEmbeddingProvider {
    fn is_available(&self) -> bool {
        false
    }

    fn model(&self) -> &str {
        "none"
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding provider disabled: {}", self.reason)
    }
}

/// Create an embedding provider from config.
///
/// `"local"` loads ONNX Runtime + all-MiniLM-L6-v2 behind a bounded cache;
/// `"none"` disables embeddings. Returns an error if model files are not
/// found. Run `memex model download` first.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            if !LOCAL_MODELS.contains(&config.model.as_str()) {
                return Err(MemoryError::ModelNotFound {
                    model_type: "embedding".into(),
                    version: Some(config.model.clone()),
                }
                .into());
            }
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Arc::new(cache::CachedEmbeddingProvider::new(
                Arc::new(provider),
                config.cache_size,
            )))
        }
        "none" => Ok(Arc::new(DisabledEmbeddingProvider::new("provider = none"))),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, none"),
    }
}

/// Like [`create_provider`], but degrades to a [`DisabledEmbeddingProvider`]
/// instead of failing.
pub fn create_provider_or_disabled(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match create_provider(config) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!(error = %e, "embedding provider unavailable, semantic reranking disabled");
            Arc::new(DisabledEmbeddingProvider::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_local_model_is_reported() {
        let config = EmbeddingConfig {
            model: "mystery-model".into(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().expect("should fail");
        assert_eq!(err.to_string(), "model not found: embedding@mystery-model");
    }

    #[test]
    fn none_provider_is_unavailable() {
        let config = EmbeddingConfig {
            provider: "none".into(),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert!(!provider.is_available());
        assert!(provider.embed("text").is_err());
    }

    #[test]
    fn missing_model_files_degrade_to_disabled() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            cache_dir: tmp.path().to_string_lossy().into_owned(),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider_or_disabled(&config);
        assert!(!provider.is_available());
    }
}
