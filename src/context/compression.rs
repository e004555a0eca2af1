//! Fitting entries into the token budget.
//!
//! Under budget: nothing changes. Over the hierarchical threshold: every
//! entry is first cut down to a short summary. Still over budget: entries are
//! ranked by priority then relevance and taken greedily until the next one no
//! longer fits.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ContextEntry;
use crate::memory::text_match::truncate_chars;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// Token count above which entries are summarized before truncating.
    pub hierarchical_threshold: usize,
    pub chars_per_token: usize,
    /// Maximum characters kept per entry by hierarchical compression.
    pub summary_chars: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hierarchical_threshold: 1500,
            chars_per_token: 4,
            summary_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    None,
    Hierarchical,
    Truncated,
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub level: CompressionLevel,
    /// `final_tokens / original_tokens`, never above 1.
    pub ratio: f64,
    pub included: Vec<ContextEntry>,
    pub excluded: Vec<ContextEntry>,
    pub original_tokens: usize,
    pub final_tokens: usize,
}

/// `ceil(chars / chars_per_token)`.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    text.chars().count().div_ceil(chars_per_token.max(1))
}

/// Cut `content` to at most `max_chars` characters plus an ellipsis,
/// preferring a sentence or word boundary in the second half.
pub fn summarize(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let head = truncate_chars(content, max_chars);
    let floor = head.len() / 2;
    let cut = head
        .rfind(". ")
        .map(|i| i + 1)
        .filter(|i| *i > floor)
        .or_else(|| head.rfind(char::is_whitespace).filter(|i| *i > floor))
        .unwrap_or(head.len());
    format!("{}…", head[..cut].trim_end())
}

#[derive(Debug, Clone, Default)]
pub struct Compressor {
    config: CompressionConfig,
}

impl Compressor {
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    pub fn entry_tokens(&self, entry: &ContextEntry) -> usize {
        estimate_tokens(&entry.content, self.config.chars_per_token)
    }

    pub fn total_tokens(&self, entries: &[ContextEntry]) -> usize {
        entries.iter().map(|e| self.entry_tokens(e)).sum()
    }

    pub fn compress(&self, entries: Vec<ContextEntry>, budget: usize) -> CompressionResult {
        let original_tokens = self.total_tokens(&entries);

        if !self.config.enabled || original_tokens <= budget {
            return CompressionResult {
                level: CompressionLevel::None,
                ratio: 1.0,
                included: entries,
                excluded: Vec::new(),
                original_tokens,
                final_tokens: original_tokens,
            };
        }

        let mut working = entries;
        if original_tokens > self.config.hierarchical_threshold {
            for entry in &mut working {
                entry.content = summarize(&entry.content, self.config.summary_chars);
            }
            let summarized = self.total_tokens(&working);
            debug!(original_tokens, summarized, budget, "hierarchical compression");
            if summarized <= budget {
                return self.finish(CompressionLevel::Hierarchical, working, Vec::new(), original_tokens);
            }
        }

        working.sort_by(|a, b| {
            b.priority
                .unwrap_or(i64::MIN)
                .cmp(&a.priority.unwrap_or(i64::MIN))
                .then_with(|| {
                    let a = a.relevance_score.unwrap_or(f64::NEG_INFINITY);
                    let b = b.relevance_score.unwrap_or(f64::NEG_INFINITY);
                    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        let mut used = 0;
        let mut split = working.len();
        for (i, entry) in working.iter().enumerate() {
            let tokens = self.entry_tokens(entry);
            if used + tokens > budget {
                split = i;
                break;
            }
            used += tokens;
        }
        let excluded = working.split_off(split);
        debug!(
            included = working.len(),
            excluded = excluded.len(),
            budget,
            "truncated compression"
        );
        self.finish(CompressionLevel::Truncated, working, excluded, original_tokens)
    }

    fn finish(
        &self,
        level: CompressionLevel,
        included: Vec<ContextEntry>,
        excluded: Vec<ContextEntry>,
        original_tokens: usize,
    ) -> CompressionResult {
        let final_tokens = self.total_tokens(&included);
        let ratio = if original_tokens == 0 {
            1.0
        } else {
            (final_tokens as f64 / original_tokens as f64).min(1.0)
        };
        CompressionResult {
            level,
            ratio,
            included,
            excluded,
            original_tokens,
            final_tokens,
        }
    }
}
