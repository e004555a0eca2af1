//! Context budget manager: turns ranked entries into bounded prompt content.
//!
//! Stages run in order: budget, staleness, priority, compression, format.
//! Every stage can be switched off in config and then passes entries through.

pub mod assemble;
pub mod budget;
pub mod compression;
pub mod format;
pub mod priority;
pub mod staleness;

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::ContextConfig;
use crate::memory::types::{EntryType, QueryResultItem};
use budget::{Budget, BudgetCalculator};
use compression::{CompressionLevel, Compressor};
use format::{Formatter, OutputFormat};
use priority::PriorityStage;
use staleness::{StaleDetector, StalenessWarning};

/// The flattened view of an entry the pipeline works on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed_at: Option<String>,
}

impl ContextEntry {
    pub fn new(id: impl Into<String>, entry_type: EntryType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entry_type,
            title: None,
            content: content.into(),
            priority: None,
            relevance_score: None,
            created_at: None,
            accessed_at: None,
        }
    }
}

impl From<&QueryResultItem> for ContextEntry {
    fn from(item: &QueryResultItem) -> Self {
        let payload = &item.entry.current.payload;
        Self {
            id: item.id.clone(),
            entry_type: item.entry_type,
            title: Some(payload.title().to_string()),
            content: payload.content().to_string(),
            priority: payload.priority(),
            relevance_score: Some(item.score),
            created_at: Some(item.entry.created_at.clone()),
            accessed_at: item.entry.last_accessed_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    pub input_entry_count: usize,
    pub output_entry_count: usize,
    pub stale_entry_count: usize,
    pub original_tokens: usize,
    pub final_tokens: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub content: String,
    pub format: OutputFormat,
    pub included: Vec<ContextEntry>,
    pub excluded: Vec<ContextEntry>,
    pub stats: ProcessStats,
    pub budget: Budget,
    pub compression_level: CompressionLevel,
    pub compression_ratio: f64,
    pub staleness_warnings: Vec<StalenessWarning>,
}

pub struct ContextBudgetManager {
    budget: BudgetCalculator,
    staleness: StaleDetector,
    priority: PriorityStage,
    compressor: Compressor,
    formatter: Formatter,
}

impl ContextBudgetManager {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            budget: BudgetCalculator::new(config.budget.clone()),
            staleness: StaleDetector::new(config.staleness.clone()),
            priority: PriorityStage::new(config.priority.clone()),
            compressor: Compressor::new(config.compression.clone()),
            formatter: Formatter::new(config.format.clone()),
        }
    }

    /// Swap the priority stage, e.g. to plug in an external prioritizer.
    pub fn with_priority(mut self, stage: PriorityStage) -> Self {
        self.priority = stage;
        self
    }

    pub fn budget_calculator(&self) -> &BudgetCalculator {
        &self.budget
    }

    pub fn process(
        &self,
        entries: Vec<ContextEntry>,
        intent: Option<&str>,
        format: Option<OutputFormat>,
        max_tokens: Option<usize>,
    ) -> ProcessResult {
        self.process_at(entries, intent, format, max_tokens, Utc::now())
    }

    /// [`process`](Self::process) with a fixed clock for staleness.
    pub fn process_at(
        &self,
        entries: Vec<ContextEntry>,
        intent: Option<&str>,
        format: Option<OutputFormat>,
        max_tokens: Option<usize>,
        now: DateTime<Utc>,
    ) -> ProcessResult {
        let started = Instant::now();
        let input_entry_count = entries.len();
        let original_tokens = self.compressor.total_tokens(&entries);

        let budget = self.budget.calculate(intent, max_tokens);

        let report = self.staleness.detect(&entries, now);
        let (survivors, mut excluded): (Vec<_>, Vec<_>) = if self.staleness.excludes() {
            entries
                .into_iter()
                .partition(|e| !report.stale_ids.contains(&e.id))
        } else {
            (entries, Vec::new())
        };

        let ordered = self.priority.apply(survivors);

        let compressed = self.compressor.compress(ordered, budget.effective_budget);
        excluded.extend(compressed.excluded);

        let format = format.unwrap_or_else(|| self.formatter.default_format());
        let content = self.formatter.render(&compressed.included, format);

        let stats = ProcessStats {
            input_entry_count,
            output_entry_count: compressed.included.len(),
            stale_entry_count: report.stale_ids.len(),
            original_tokens,
            final_tokens: compressed.final_tokens,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        debug!(
            input = stats.input_entry_count,
            output = stats.output_entry_count,
            stale = stats.stale_entry_count,
            level = ?compressed.level,
            "context processed"
        );

        ProcessResult {
            content,
            format,
            included: compressed.included,
            excluded,
            stats,
            budget,
            compression_level: compressed.level,
            compression_ratio: compressed.ratio,
            staleness_warnings: report.warnings,
        }
    }
}

impl Default for ContextBudgetManager {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}
