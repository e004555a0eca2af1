//! Bounded in-memory embedding cache.
//!
//! Wraps any [`EmbeddingProvider`] and memoizes vectors by exact input text.
//! Entries are whole recomputations, so concurrent or abandoned requests can
//! only ever insert complete vectors.

use std::sync::Arc;

use anyhow::Result;
use moka::sync::Cache;

use super::EmbeddingProvider;

pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Cache<String, Vec<f32>>,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_entries: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }
}

impl EmbeddingProvider for CachedEmbeddingProvider {
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit);
        }
        let embedding = self.inner.embed(text)?;
        self.cache.insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Option<Vec<f32>>>> {
        let mut results: Vec<Option<Vec<f32>>> =
            texts.iter().map(|t| self.cache.get(*t)).collect();

        let misses: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();
        if misses.is_empty() {
            return Ok(results);
        }

        let miss_texts: Vec<&str> = misses.iter().map(|&i| texts[i]).collect();
        let fresh = self.inner.embed_batch(&miss_texts)?;
        anyhow::ensure!(
            fresh.len() == miss_texts.len(),
            "embedding batch returned {} vectors for {} inputs",
            fresh.len(),
            miss_texts.len()
        );

        for (slot, embedding) in misses.into_iter().zip(fresh) {
            if let Some(ref vector) = embedding {
                self.cache.insert(texts[slot].to_string(), vector.clone());
            }
            results[slot] = embedding;
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
