//! Optional embedding-based re-scoring of the top query hits.
//!
//! Blends cosine similarity between the query and each candidate's text with
//! the candidate's existing score. Any backend failure leaves the results
//! exactly as they were.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::memory::types::{sort_by_score, QueryResultItem};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub top_k: usize,
    /// Weight of cosine similarity; the original score gets `1 - alpha`.
    pub alpha: f64,
    pub min_score_threshold: f64,
    pub semantic_queries_only: bool,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 20,
            alpha: 0.5,
            min_score_threshold: 0.1,
            semantic_queries_only: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankStats {
    pub applied: bool,
    pub candidates_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub processing_time_ms: u64,
}

/// What the stage reads and rewrites.
#[derive(Debug, Clone)]
pub struct RerankContext {
    pub search: Option<String>,
    pub semantic: bool,
    pub results: Vec<QueryResultItem>,
    pub stats: RerankStats,
}

impl RerankContext {
    pub fn new(search: Option<String>, semantic: bool, results: Vec<QueryResultItem>) -> Self {
        Self {
            search,
            semantic,
            results,
            stats: RerankStats::default(),
        }
    }
}

/// Text embedded for a candidate: its name or title followed by its category.
pub fn candidate_text(item: &QueryResultItem) -> String {
    let payload = &item.entry.current.payload;
    match payload.category() {
        Some(category) if !category.is_empty() => format!("{} {}", payload.title(), category),
        _ => payload.title().to_string(),
    }
}

/// Dot product over norms. Empty or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(MemoryError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// `Σ vᵢwᵢ / Σ wᵢ`; 0 when the weights sum to 0.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Result<f64> {
    if values.len() != weights.len() {
        return Err(MemoryError::LengthMismatch {
            values: values.len(),
            weights: weights.len(),
        });
    }
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return Ok(0.0);
    }
    let sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Ok(sum / total)
}

pub struct RerankStage {
    config: RerankConfig,
    provider: Arc<dyn EmbeddingProvider>,
}

impl RerankStage {
    pub fn new(config: RerankConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    fn should_apply(&self, ctx: &RerankContext) -> bool {
        if !self.config.enabled || ctx.results.is_empty() {
            return false;
        }
        if ctx.search.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return false;
        }
        if self.config.semantic_queries_only && !ctx.semantic {
            return false;
        }
        if !self.provider.is_available() {
            debug!("embedding provider unavailable, skipping rerank");
            return false;
        }
        true
    }

    /// Re-score and re-sort `ctx.results`, or hand `ctx` back untouched.
    pub fn rerank(&self, ctx: RerankContext) -> RerankContext {
        if !self.should_apply(&ctx) {
            return ctx;
        }

        let started = Instant::now();
        match self.try_rerank(&ctx) {
            Ok((results, processed)) => {
                let elapsed = started.elapsed().as_millis() as u64;
                debug!(candidates = processed, elapsed_ms = elapsed, "rerank applied");
                RerankContext {
                    results,
                    stats: RerankStats {
                        applied: true,
                        candidates_processed: processed,
                        embedding_model: Some(self.provider.model().to_string()),
                        processing_time_ms: elapsed,
                    },
                    ..ctx
                }
            }
            Err(e) => {
                warn!(error = %e, "rerank failed, keeping original ranking");
                ctx
            }
        }
    }

    fn try_rerank(&self, ctx: &RerankContext) -> Result<(Vec<QueryResultItem>, usize)> {
        let query = ctx.search.as_deref().unwrap_or_default();
        let mut results = ctx.results.clone();
        sort_by_score(&mut results);

        let top_k = self.config.top_k.min(results.len());
        let texts: Vec<String> = results[..top_k].iter().map(candidate_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let query_embedding = self.provider.embed(query)?;
        let embeddings = self.provider.embed_batch(&text_refs)?;

        let alpha = self.config.alpha;
        for (item, embedding) in results[..top_k].iter_mut().zip(embeddings) {
            let Some(embedding) = embedding else {
                continue;
            };
            if item.score < self.config.min_score_threshold {
                continue;
            }
            let similarity = cosine_similarity(&query_embedding, &embedding)?;
            item.score = weighted_mean(&[similarity, item.score], &[alpha, 1.0 - alpha])?;
        }

        sort_by_score(&mut results);
        Ok((results, top_k))
    }
}
