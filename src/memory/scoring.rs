//! Relevance scoring: weighted signal sum plus a recency term.
//!
//! Signals are explicit relation to the query anchor, tag overlap, proximity
//! in the scope chain, and text-match strength. Recency decays with entry age
//! using one of three curves with per-type half-lives.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::scope::scope_distance;
use crate::memory::types::{Entry, EntryType, ScopeDescriptor};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Shape of the recency curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayFunction {
    /// 1 at age 0, falling to 0 at twice the half-life.
    Linear,
    /// Halves every half-life; never reaches 0.
    #[default]
    Exponential,
    /// 1 up to the half-life, 0 after.
    Step,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub explicit_relation: f64,
    pub tag_match: f64,
    pub scope_proximity: f64,
    pub text_match: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            explicit_relation: 10.0,
            tag_match: 5.0,
            scope_proximity: 3.0,
            text_match: 1.0,
        }
    }
}

/// Half-life in days for each entry type.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HalfLives {
    pub guideline: f64,
    pub knowledge: f64,
    pub tool: f64,
    pub experience: f64,
}

impl Default for HalfLives {
    fn default() -> Self {
        Self {
            guideline: 30.0,
            knowledge: 14.0,
            tool: 30.0,
            experience: 7.0,
        }
    }
}

impl HalfLives {
    pub fn for_type(&self, entry_type: EntryType) -> f64 {
        match entry_type {
            EntryType::Guideline => self.guideline,
            EntryType::Knowledge => self.knowledge,
            EntryType::Tool => self.tool,
            EntryType::Experience => self.experience,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecencyConfig {
    pub enabled: bool,
    pub decay_function: DecayFunction,
    pub weight: f64,
    pub max_boost: f64,
    pub use_updated_at: bool,
    pub half_life_days: HalfLives,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            decay_function: DecayFunction::Exponential,
            weight: 1.0,
            max_boost: 2.0,
            use_updated_at: true,
            half_life_days: HalfLives::default(),
        }
    }
}

impl RecencyConfig {
    pub fn options_for(&self, entry_type: EntryType) -> RecencyOptions {
        RecencyOptions {
            decay_function: self.decay_function,
            half_life_days: self.half_life_days.for_type(entry_type),
            weight: self.weight,
            max_boost: self.max_boost,
            use_updated_at: self.use_updated_at,
        }
    }
}

/// Inputs to [`compute_recency_score`] for one entry.
#[derive(Debug, Clone, Copy)]
pub struct RecencyOptions {
    pub decay_function: DecayFunction,
    pub half_life_days: f64,
    pub weight: f64,
    pub max_boost: f64,
    pub use_updated_at: bool,
}

pub fn linear_decay(age_days: f64, window_days: f64) -> f64 {
    if age_days <= 0.0 {
        return 1.0;
    }
    if window_days <= 0.0 || age_days >= window_days {
        return 0.0;
    }
    1.0 - age_days / window_days
}

pub fn exponential_decay(age_days: f64, half_life_days: f64) -> f64 {
    if age_days <= 0.0 {
        return 1.0;
    }
    if half_life_days <= 0.0 {
        return 0.0;
    }
    0.5f64.powf(age_days / half_life_days)
}

pub fn step_decay(age_days: f64, window_days: f64) -> f64 {
    if age_days <= window_days {
        1.0
    } else {
        0.0
    }
}

/// Parse RFC 3339, SQLite `YYYY-MM-DD HH:MM:SS`, or a bare date.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Age in fractional days (negative for timestamps in the future).
pub fn age_in_days(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - timestamp).num_milliseconds() as f64 / MS_PER_DAY
}

/// `weight × max_boost × decay(age)`, or 0 when no timestamp parses.
pub fn compute_recency_score(
    created_at: Option<&str>,
    updated_at: Option<&str>,
    options: &RecencyOptions,
    now: DateTime<Utc>,
) -> f64 {
    let created = created_at.and_then(parse_timestamp);
    let updated = updated_at.and_then(parse_timestamp);

    let timestamp = if options.use_updated_at {
        updated.or(created)
    } else {
        created.or(updated)
    };
    let Some(timestamp) = timestamp else {
        debug!("no parseable timestamp, recency score is 0");
        return 0.0;
    };

    let age = age_in_days(timestamp, now);
    let decay = match options.decay_function {
        DecayFunction::Linear => linear_decay(age, options.half_life_days * 2.0),
        DecayFunction::Exponential => exponential_decay(age, options.half_life_days),
        DecayFunction::Step => step_decay(age, options.half_life_days),
    };
    options.weight * options.max_boost * decay
}

/// Per-request signals the scorer looks entries up in.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// IDs matched by the text search, when the query had search text.
    pub text_hits: Option<HashSet<String>>,
    /// IDs reached from the relation anchor.
    pub related_ids: HashSet<String>,
    /// Tags the request asked for.
    pub requested_tags: Vec<String>,
    /// Tags attached to each candidate.
    pub entry_tags: HashMap<String, Vec<String>>,
    /// Resolved scope chain; empty when the request had no scope.
    pub scope_chain: Vec<ScopeDescriptor>,
    pub now: DateTime<Utc>,
}

impl QueryContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            text_hits: None,
            related_ids: HashSet::new(),
            requested_tags: Vec::new(),
            entry_tags: HashMap::new(),
            scope_chain: Vec::new(),
            now,
        }
    }
}

/// Normalised factor values before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub explicit_relation: f64,
    pub tag_match: f64,
    pub scope_proximity: f64,
    pub text_match: f64,
    pub recency: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    pub weights: ScoringWeights,
    pub recency: RecencyConfig,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights, recency: RecencyConfig) -> Self {
        Self { weights, recency }
    }

    pub fn score(&self, entry: &Entry, ctx: &QueryContext) -> f64 {
        let b = self.breakdown(entry, ctx);
        self.weights.explicit_relation * b.explicit_relation
            + self.weights.tag_match * b.tag_match
            + self.weights.scope_proximity * b.scope_proximity
            + self.weights.text_match * b.text_match
            + b.recency
    }

    pub fn breakdown(&self, entry: &Entry, ctx: &QueryContext) -> ScoreBreakdown {
        let explicit_relation = f64::from(u8::from(ctx.related_ids.contains(&entry.id)));

        let tag_match = if ctx.requested_tags.is_empty() {
            0.0
        } else {
            let tags = ctx.entry_tags.get(&entry.id);
            let matched = ctx
                .requested_tags
                .iter()
                .filter(|wanted| {
                    tags.is_some_and(|tags| tags.iter().any(|t| t.eq_ignore_ascii_case(wanted)))
                })
                .count();
            matched as f64 / ctx.requested_tags.len() as f64
        };

        let scope_proximity = if ctx.scope_chain.is_empty() {
            0.0
        } else {
            let len = ctx.scope_chain.len();
            scope_distance(&ctx.scope_chain, entry.scope_type, entry.scope_id.as_deref())
                .map_or(0.0, |d| (len - d) as f64 / len as f64)
        };

        let text_match = match &ctx.text_hits {
            Some(hits) if hits.contains(&entry.id) => 1.0,
            _ => 0.0,
        };

        let recency = if self.recency.enabled {
            let options = self.recency.options_for(entry.entry_type());
            compute_recency_score(
                Some(&entry.created_at),
                Some(entry.updated_at()),
                &options,
                ctx.now,
            )
        } else {
            0.0
        };

        ScoreBreakdown {
            explicit_relation,
            tag_match,
            scope_proximity,
            text_match,
            recency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{
        EntryPayload, GuidelinePayload, ScopeType, Version,
    };
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> String {
        (now() - chrono::Duration::days(days)).to_rfc3339()
    }

    fn guideline(id: &str, scope_type: ScopeType, scope_id: Option<&str>, age_days: i64) -> Entry {
        Entry {
            id: id.into(),
            scope_type,
            scope_id: scope_id.map(String::from),
            is_active: true,
            created_at: days_ago(age_days),
            last_accessed_at: None,
            current: Version {
                id: format!("{id}-v1"),
                entry_id: id.into(),
                version_num: 1,
                payload: EntryPayload::Guideline(GuidelinePayload {
                    name: id.into(),
                    category: None,
                    priority: 50,
                    content: "content".into(),
                    rationale: None,
                }),
                created_at: days_ago(age_days),
            },
        }
    }

    fn options(decay_function: DecayFunction) -> RecencyOptions {
        RecencyOptions {
            decay_function,
            half_life_days: 14.0,
            weight: 1.0,
            max_boost: 1.0,
            use_updated_at: true,
        }
    }

    #[test]
    fn decay_curves_known_values() {
        assert!((exponential_decay(14.0, 14.0) - 0.5).abs() < 1e-9);
        assert!((exponential_decay(28.0, 14.0) - 0.25).abs() < 1e-9);
        assert_eq!(exponential_decay(-3.0, 14.0), 1.0);
        assert!(exponential_decay(10_000.0, 14.0) > 0.0);

        assert_eq!(linear_decay(15.0, 30.0), 0.5);
        assert_eq!(linear_decay(0.0, 30.0), 1.0);
        assert_eq!(linear_decay(45.0, 30.0), 0.0);

        assert_eq!(step_decay(30.0, 30.0), 1.0);
        assert_eq!(step_decay(31.0, 30.0), 0.0);
    }

    #[test]
    fn recency_zero_without_timestamps() {
        let opts = options(DecayFunction::Exponential);
        assert_eq!(compute_recency_score(None, None, &opts, now()), 0.0);
        assert_eq!(
            compute_recency_score(Some("not a date"), Some("yesterday"), &opts, now()),
            0.0
        );
    }

    #[test]
    fn recency_prefers_updated_at_when_asked() {
        let created = days_ago(28);
        let updated = days_ago(0);
        let mut opts = options(DecayFunction::Exponential);

        let fresh = compute_recency_score(Some(&created), Some(&updated), &opts, now());
        assert!((fresh - 1.0).abs() < 1e-9);

        opts.use_updated_at = false;
        let old = compute_recency_score(Some(&created), Some(&updated), &opts, now());
        assert!((old - 0.25).abs() < 1e-9);
    }

    #[test]
    fn linear_window_is_twice_half_life_step_is_not() {
        let ts = days_ago(21);
        let linear = compute_recency_score(Some(&ts), None, &options(DecayFunction::Linear), now());
        assert!((linear - 0.25).abs() < 1e-9);
        let step = compute_recency_score(Some(&ts), None, &options(DecayFunction::Step), now());
        assert_eq!(step, 0.0);
    }

    #[test]
    fn recency_scales_by_weight_and_boost() {
        let ts = days_ago(14);
        let mut opts = options(DecayFunction::Exponential);
        opts.weight = 0.5;
        opts.max_boost = 4.0;
        let score = compute_recency_score(Some(&ts), None, &opts, now());
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        assert!(parse_timestamp("2026-01-02T03:04:05Z").is_some());
        assert!(parse_timestamp("2026-01-02T03:04:05.123+02:00").is_some());
        assert!(parse_timestamp("2026-01-02 03:04:05").is_some());
        assert!(parse_timestamp("2026-01-02").is_some());
        assert!(parse_timestamp("01/02/2026").is_none());
    }

    #[test]
    fn weighted_signals_add_up() {
        let engine = ScoringEngine::new(
            ScoringWeights::default(),
            RecencyConfig {
                enabled: false,
                ..RecencyConfig::default()
            },
        );
        let chain = vec![
            ScopeDescriptor::new(ScopeType::Project, "p1").inheriting(),
            ScopeDescriptor::global(),
        ];
        let mut ctx = QueryContext::new(now());
        ctx.scope_chain = chain;
        ctx.text_hits = Some(HashSet::from(["a".to_string()]));
        ctx.related_ids = HashSet::from(["a".to_string()]);
        ctx.requested_tags = vec!["rust".into(), "db".into()];
        ctx.entry_tags
            .insert("a".into(), vec!["Rust".into(), "cli".into()]);

        let exact = guideline("a", ScopeType::Project, Some("p1"), 0);
        // 10 relation + 5 × 0.5 tags + 3 × 1.0 scope + 1 text
        assert!((engine.score(&exact, &ctx) - 16.5).abs() < 1e-9);

        let inherited = guideline("b", ScopeType::Global, None, 0);
        // only scope proximity at distance 1 of 2
        assert!((engine.score(&inherited, &ctx) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn closer_scope_and_newer_entry_rank_higher() {
        let engine = ScoringEngine::default();
        let mut ctx = QueryContext::new(now());
        ctx.scope_chain = vec![
            ScopeDescriptor::new(ScopeType::Project, "p1").inheriting(),
            ScopeDescriptor::global(),
        ];
        let near = guideline("near", ScopeType::Project, Some("p1"), 10);
        let far = guideline("far", ScopeType::Global, None, 10);
        assert!(engine.score(&near, &ctx) > engine.score(&far, &ctx));

        let new = guideline("new", ScopeType::Global, None, 1);
        let old = guideline("old", ScopeType::Global, None, 90);
        assert!(engine.score(&new, &ctx) > engine.score(&old, &ctx));
    }
}
