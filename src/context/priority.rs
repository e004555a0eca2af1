//! Priority ordering of context entries.
//!
//! An external [`Prioritizer`] may be plugged in. Without one, entries are
//! sorted by relevance score only and `min_score` is not applied.

use std::sync::Arc;

use serde::Deserialize;

use super::ContextEntry;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub enabled: bool,
    /// Handed to external prioritizers; passthrough ignores it.
    pub min_score: Option<f64>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: None,
        }
    }
}

pub trait Prioritizer: Send + Sync {
    fn prioritize(&self, entries: Vec<ContextEntry>, min_score: Option<f64>) -> Vec<ContextEntry>;
}

/// Sort by relevance descending; entries without a score go last.
pub struct PassthroughPrioritizer;

impl Prioritizer for PassthroughPrioritizer {
    fn prioritize(&self, mut entries: Vec<ContextEntry>, _min_score: Option<f64>) -> Vec<ContextEntry> {
        entries.sort_by(|a, b| {
            let a = a.relevance_score.unwrap_or(f64::NEG_INFINITY);
            let b = b.relevance_score.unwrap_or(f64::NEG_INFINITY);
            b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }
}

#[derive(Clone)]
pub struct PriorityStage {
    config: PriorityConfig,
    prioritizer: Arc<dyn Prioritizer>,
}

impl PriorityStage {
    pub fn new(config: PriorityConfig) -> Self {
        Self {
            config,
            prioritizer: Arc::new(PassthroughPrioritizer),
        }
    }

    pub fn with_prioritizer(mut self, prioritizer: Arc<dyn Prioritizer>) -> Self {
        self.prioritizer = prioritizer;
        self
    }

    pub fn apply(&self, entries: Vec<ContextEntry>) -> Vec<ContextEntry> {
        if !self.config.enabled {
            return entries;
        }
        self.prioritizer.prioritize(entries, self.config.min_score)
    }
}

impl Default for PriorityStage {
    fn default() -> Self {
        Self::new(PriorityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::EntryType;

    fn scored(id: &str, score: Option<f64>) -> ContextEntry {
        ContextEntry {
            relevance_score: score,
            ..ContextEntry::new(id, EntryType::Tool, "x")
        }
    }

    fn ids(entries: &[ContextEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn passthrough_sorts_but_keeps_low_scores() {
        let stage = PriorityStage::new(PriorityConfig {
            enabled: true,
            min_score: Some(0.5),
        });
        let out = stage.apply(vec![
            scored("low", Some(0.1)),
            scored("none", None),
            scored("high", Some(0.9)),
        ]);
        // min_score is not enforced without an external prioritizer
        assert_eq!(ids(&out), vec!["high", "low", "none"]);
    }

    #[test]
    fn disabled_stage_keeps_order() {
        let stage = PriorityStage::new(PriorityConfig {
            enabled: false,
            min_score: None,
        });
        let out = stage.apply(vec![scored("a", Some(0.1)), scored("b", Some(0.9))]);
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    struct Threshold;

    impl Prioritizer for Threshold {
        fn prioritize(&self, entries: Vec<ContextEntry>, min_score: Option<f64>) -> Vec<ContextEntry> {
            let min = min_score.unwrap_or(0.0);
            entries
                .into_iter()
                .filter(|e| e.relevance_score.unwrap_or(0.0) >= min)
                .collect()
        }
    }

    #[test]
    fn external_prioritizer_is_delegated_to() {
        let stage = PriorityStage::new(PriorityConfig {
            enabled: true,
            min_score: Some(0.5),
        })
        .with_prioritizer(Arc::new(Threshold));
        let out = stage.apply(vec![scored("low", Some(0.1)), scored("high", Some(0.9))]);
        assert_eq!(ids(&out), vec!["high"]);
    }
}
