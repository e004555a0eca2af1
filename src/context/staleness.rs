//! Stale entry detection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContextEntry;
use crate::memory::scoring::{age_in_days, parse_timestamp};
use crate::memory::types::EntryType;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    pub enabled: bool,
    pub stale_age_days: f64,
    pub not_accessed_days: f64,
    /// Drop flagged entries from the injected context.
    pub exclude_from_injection: bool,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_age_days: 90.0,
            not_accessed_days: 60.0,
            exclude_from_injection: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    OldAge,
    NotAccessed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessWarning {
    pub entry_id: String,
    pub entry_type: EntryType,
    pub reason: StaleReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_days: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct StalenessReport {
    pub warnings: Vec<StalenessWarning>,
    /// Distinct flagged entries; one entry may carry both warnings.
    pub stale_ids: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaleDetector {
    config: StalenessConfig,
}

impl StaleDetector {
    pub fn new(config: StalenessConfig) -> Self {
        Self { config }
    }

    pub fn excludes(&self) -> bool {
        self.config.enabled && self.config.exclude_from_injection
    }

    pub fn detect(&self, entries: &[ContextEntry], now: DateTime<Utc>) -> StalenessReport {
        let mut report = StalenessReport::default();
        if !self.config.enabled {
            return report;
        }

        for entry in entries {
            let mut flag = |reason: StaleReason, age: f64| {
                report.warnings.push(StalenessWarning {
                    entry_id: entry.id.clone(),
                    entry_type: entry.entry_type,
                    reason,
                    age_days: Some((age * 10.0).round() / 10.0),
                });
                report.stale_ids.insert(entry.id.clone());
            };

            if let Some(created) = entry.created_at.as_deref().and_then(parse_timestamp) {
                let age = age_in_days(created, now);
                if age > self.config.stale_age_days {
                    flag(StaleReason::OldAge, age);
                }
            }
            if let Some(accessed) = entry.accessed_at.as_deref().and_then(parse_timestamp) {
                let idle = age_in_days(accessed, now);
                if idle > self.config.not_accessed_days {
                    flag(StaleReason::NotAccessed, idle);
                }
            }
        }

        tracing::debug!(
            warnings = report.warnings.len(),
            stale = report.stale_ids.len(),
            "staleness checked"
        );
        report
    }
}
