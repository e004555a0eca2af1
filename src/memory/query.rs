//! Query router: strategy inference, retrieval, scoring and pagination.
//!
//! [`infer_strategy`] picks exactly one strategy from the request in a fixed
//! priority order. [`QueryRouter::execute_query`] gathers candidates over the
//! resolved scope chain, narrows them with the strategy's predicate, scores
//! every survivor, optionally reranks semantic queries, then pages the result
//! by offset or by an opaque `(created_at, id)` cursor.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::QueryConfig;
use crate::error::{MemoryError, Result};
use crate::memory::repository::{RelationGraph, Repository, ScopeHierarchy, TraverseOptions};
use crate::memory::rerank::{RerankContext, RerankStage, RerankStats};
use crate::memory::scope::resolve_scope_chain;
use crate::memory::scoring::{parse_timestamp, QueryContext, ScoringEngine};
use crate::memory::text_index::{resolve_fields, TextIndexBackend, TextIndexSearch};
use crate::memory::text_match::{MatchMode, TextMatcher};
use crate::memory::types::{
    sort_by_score, Entry, EntryPayload, EntryType, QueryResultItem, RelationDirection,
    RelationType, ScopeDescriptor,
};

/// Relation traversal depth when the request leaves it out.
const DEFAULT_RELATION_DEPTH: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    Text,
    Semantic,
    Relation,
    Tag,
    Date,
    Priority,
    Conversation,
    Default,
}

impl QueryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Semantic => "semantic",
            Self::Relation => "relation",
            Self::Tag => "tag",
            Self::Date => "date",
            Self::Priority => "priority",
            Self::Conversation => "conversation",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueryStrategy {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "semantic" => Ok(Self::Semantic),
            "relation" => Ok(Self::Relation),
            "tag" => Ok(Self::Tag),
            "date" => Ok(Self::Date),
            "priority" => Ok(Self::Priority),
            "conversation" => Ok(Self::Conversation),
            "default" => Ok(Self::Default),
            other => Err(MemoryError::UnsupportedStrategy(other.to_string())),
        }
    }
}

/// Anchor for relation queries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTo {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub id: String,
    #[serde(default)]
    pub relation: Option<RelationType>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub direction: Option<RelationDirection>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// `include`: any of; `require`: all of; `exclude`: none of. Case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TagFilter {
    pub include: Vec<String>,
    pub require: Vec<String>,
    pub exclude: Vec<String>,
}

impl TagFilter {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.require.is_empty() && self.exclude.is_empty()
    }

    fn accepts(&self, tags: &[String]) -> bool {
        let has = |wanted: &String| tags.iter().any(|t| t.eq_ignore_ascii_case(wanted));
        (self.include.is_empty() || self.include.iter().any(has))
            && self.require.iter().all(has)
            && !self.exclude.iter().any(has)
    }

    /// Tags that count toward the tag-match score.
    fn wanted(&self) -> Vec<String> {
        let mut wanted = self.include.clone();
        for tag in &self.require {
            if !wanted.iter().any(|w| w.eq_ignore_ascii_case(tag)) {
                wanted.push(tag.clone());
            }
        }
        wanted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PriorityRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// Date bounds, inclusive. Unparseable bounds are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
}

/// Flat request as it arrives from a transport.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryRequest {
    /// Empty means every type.
    pub types: Vec<EntryType>,
    pub scope: Option<ScopeDescriptor>,
    /// Force a strategy instead of inferring one.
    pub strategy: Option<String>,
    pub search: Option<String>,
    pub fields: Vec<String>,
    pub fuzzy: bool,
    pub regex: bool,
    pub semantic_search: bool,
    pub related_to: Option<RelatedTo>,
    pub tags: Option<TagFilter>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
    pub updated_after: Option<String>,
    pub updated_before: Option<String>,
    pub priority: Option<PriorityRange>,
    pub conversation_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub cursor: Option<String>,
    pub use_cursor: bool,
    pub include_inactive: bool,
}

impl QueryRequest {
    fn search_text(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn match_mode(&self) -> MatchMode {
        if self.regex {
            MatchMode::Regex
        } else if self.fuzzy {
            MatchMode::Fuzzy
        } else {
            MatchMode::Substring
        }
    }

    fn has_date_bounds(&self) -> bool {
        self.created_after.is_some()
            || self.created_before.is_some()
            || self.updated_after.is_some()
            || self.updated_before.is_some()
    }
}

/// Pick the strategy, first match wins.
pub fn infer_strategy(request: &QueryRequest) -> QueryStrategy {
    if request.semantic_search {
        QueryStrategy::Semantic
    } else if request.related_to.is_some() {
        QueryStrategy::Relation
    } else if request.tags.as_ref().is_some_and(|t| !t.is_empty()) {
        QueryStrategy::Tag
    } else if request.has_date_bounds() {
        QueryStrategy::Date
    } else if request.priority.is_some() {
        QueryStrategy::Priority
    } else if request.conversation_id.is_some() {
        QueryStrategy::Conversation
    } else if request.search_text().is_some() {
        QueryStrategy::Text
    } else {
        QueryStrategy::Default
    }
}

/// Strategy-specific parameters, one variant per strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParams {
    Text {
        search: String,
        fields: Vec<String>,
        mode: MatchMode,
    },
    Semantic {
        search: String,
        fields: Vec<String>,
    },
    Relation(RelatedTo),
    Tag(TagFilter),
    Date(DateRange),
    Priority(PriorityRange),
    Conversation {
        conversation_id: String,
    },
    Default,
}

impl QueryParams {
    pub fn strategy(&self) -> QueryStrategy {
        match self {
            Self::Text { .. } => QueryStrategy::Text,
            Self::Semantic { .. } => QueryStrategy::Semantic,
            Self::Relation(_) => QueryStrategy::Relation,
            Self::Tag(_) => QueryStrategy::Tag,
            Self::Date(_) => QueryStrategy::Date,
            Self::Priority(_) => QueryStrategy::Priority,
            Self::Conversation { .. } => QueryStrategy::Conversation,
            Self::Default => QueryStrategy::Default,
        }
    }

    /// Validate `request` and carve out the parameters its strategy needs.
    pub fn from_request(request: &QueryRequest) -> Result<Self> {
        let strategy = match request.strategy.as_deref() {
            Some(name) => name.parse()?,
            None => infer_strategy(request),
        };
        let search = request.search_text().unwrap_or_default().to_string();

        let params = match strategy {
            QueryStrategy::Text => {
                if search.is_empty() {
                    return Err(MemoryError::InvalidRequest(
                        "text strategy requires a search string".into(),
                    ));
                }
                Self::Text {
                    search,
                    fields: request.fields.clone(),
                    mode: request.match_mode(),
                }
            }
            QueryStrategy::Semantic => Self::Semantic {
                search,
                fields: request.fields.clone(),
            },
            QueryStrategy::Relation => {
                let related = request.related_to.clone().ok_or_else(|| {
                    MemoryError::InvalidRequest("relation strategy requires relatedTo".into())
                })?;
                if related.id.trim().is_empty() {
                    return Err(MemoryError::InvalidRequest("relatedTo.id is required".into()));
                }
                Self::Relation(related)
            }
            QueryStrategy::Tag => Self::Tag(request.tags.clone().unwrap_or_default()),
            QueryStrategy::Date => Self::Date(DateRange {
                created_after: parse_bound("createdAfter", request.created_after.as_deref()),
                created_before: parse_bound("createdBefore", request.created_before.as_deref()),
                updated_after: parse_bound("updatedAfter", request.updated_after.as_deref()),
                updated_before: parse_bound("updatedBefore", request.updated_before.as_deref()),
            }),
            QueryStrategy::Priority => {
                let range = request.priority.unwrap_or_default();
                if let (Some(min), Some(max)) = (range.min, range.max) {
                    if min > max {
                        return Err(MemoryError::InvalidRequest(format!(
                            "priority.min ({min}) is greater than priority.max ({max})"
                        )));
                    }
                }
                Self::Priority(range)
            }
            QueryStrategy::Conversation => Self::Conversation {
                conversation_id: request.conversation_id.clone().ok_or_else(|| {
                    MemoryError::InvalidRequest(
                        "conversation strategy requires conversationId".into(),
                    )
                })?,
            },
            QueryStrategy::Default => Self::Default,
        };
        Ok(params)
    }
}

fn parse_bound(name: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    let parsed = parse_timestamp(value);
    if parsed.is_none() {
        warn!(bound = name, value, "unparseable date filter ignored");
    }
    parsed
}

/// Position of the last item on a cursor page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorPosition {
    created_at: String,
    id: String,
}

fn encode_cursor(position: &CursorPosition) -> Result<String> {
    let json = serde_json::to_vec(position).map_err(anyhow::Error::from)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_cursor(cursor: &str) -> Result<CursorPosition> {
    let invalid = || MemoryError::InvalidRequest("invalid cursor".into());
    let bytes = URL_SAFE_NO_PAD.decode(cursor.trim()).map_err(|_| invalid())?;
    serde_json::from_slice(&bytes).map_err(|_| invalid())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PageMeta {
    #[serde(rename_all = "camelCase")]
    Cursor {
        returned_count: usize,
        has_more: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_cursor: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Offset {
        returned_count: usize,
        limit: usize,
        offset: usize,
        has_more: bool,
    },
}

impl PageMeta {
    pub fn has_more(&self) -> bool {
        match self {
            Self::Cursor { has_more, .. } | Self::Offset { has_more, .. } => *has_more,
        }
    }

    pub fn next_cursor(&self) -> Option<&str> {
        match self {
            Self::Cursor { next_cursor, .. } => next_cursor.as_deref(),
            Self::Offset { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub strategy: QueryStrategy,
    pub results: Vec<QueryResultItem>,
    pub meta: PageMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankStats>,
}

/// Text of `field` on `payload`, using the same names as the text index.
fn field_value<'a>(payload: &'a EntryPayload, field: &str) -> Option<&'a str> {
    match field {
        "name" | "title" => Some(payload.title()),
        "content" | "description" => Some(payload.content()),
        "rationale" | "source" | "scenario" => payload.detail(),
        _ => None,
    }
}

/// Retrieval front door over the storage collaborators.
pub struct QueryRouter {
    repo: Arc<dyn Repository>,
    hierarchy: Arc<dyn ScopeHierarchy>,
    graph: Arc<dyn RelationGraph>,
    text_index: TextIndexSearch,
    matcher: TextMatcher,
    scoring: ScoringEngine,
    rerank: Option<RerankStage>,
    default_limit: usize,
    max_limit: usize,
}

impl QueryRouter {
    pub fn new(
        repo: Arc<dyn Repository>,
        hierarchy: Arc<dyn ScopeHierarchy>,
        graph: Arc<dyn RelationGraph>,
        text_backend: Arc<dyn TextIndexBackend>,
        config: &QueryConfig,
    ) -> Self {
        Self {
            repo,
            hierarchy,
            graph,
            text_index: TextIndexSearch::new(text_backend),
            matcher: TextMatcher::new(config.regex_cache_size),
            scoring: ScoringEngine::new(config.weights.clone(), config.recency.clone()),
            rerank: None,
            default_limit: config.default_limit.max(1),
            max_limit: config.max_limit.max(1),
        }
    }

    pub fn with_rerank(mut self, stage: RerankStage) -> Self {
        self.rerank = Some(stage);
        self
    }

    pub fn execute_query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.execute_query_at(request, Utc::now())
    }

    /// [`execute_query`](Self::execute_query) with a fixed clock for recency.
    pub fn execute_query_at(
        &self,
        request: &QueryRequest,
        now: DateTime<Utc>,
    ) -> Result<QueryResponse> {
        let params = QueryParams::from_request(request)?;
        let strategy = params.strategy();

        let limit = request
            .limit
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit);
        let cursor = request.cursor.as_deref().map(decode_cursor).transpose()?;

        if let QueryParams::Relation(related) = &params {
            if self.repo.get_by_id(related.entry_type, &related.id)?.is_none() {
                return Err(MemoryError::InvalidRequest(format!(
                    "relatedTo {} {} does not exist",
                    related.entry_type, related.id
                )));
            }
        }

        let scope_chain = match &request.scope {
            Some(scope) => resolve_scope_chain(scope, self.hierarchy.as_ref())?,
            None => Vec::new(),
        };
        let types: Vec<EntryType> = if request.types.is_empty() {
            EntryType::ALL.to_vec()
        } else {
            request.types.clone()
        };

        let mut ctx = QueryContext::new(now);
        ctx.scope_chain = scope_chain.clone();

        let mut results = Vec::new();
        for entry_type in &types {
            let candidates = self.candidates(*entry_type, &scope_chain, request.include_inactive)?;
            let kept = self.apply_strategy(*entry_type, candidates, &params, request, &mut ctx)?;
            results.extend(kept);
        }

        let mut items: Vec<QueryResultItem> = results
            .into_iter()
            .map(|entry| {
                let score = self.scoring.score(&entry, &ctx);
                QueryResultItem::new(entry, score)
            })
            .collect();
        sort_by_score(&mut items);

        if let QueryParams::Relation(RelatedTo {
            max_results: Some(max),
            ..
        }) = &params
        {
            items.truncate(*max);
        }

        // The stage decides whether non-semantic queries qualify.
        let mut rerank_stats = None;
        if let (Some(stage), Some(search)) = (&self.rerank, request.search_text()) {
            let semantic = matches!(params, QueryParams::Semantic { .. });
            let out = stage.rerank(RerankContext::new(Some(search.to_string()), semantic, items));
            items = out.results;
            rerank_stats = Some(out.stats);
        }

        let (results, meta) = if cursor.is_some() || request.use_cursor {
            paginate_cursor(items, cursor.as_ref(), limit)?
        } else {
            paginate_offset(items, request.offset.unwrap_or(0), limit)
        };

        info!(
            strategy = %strategy,
            returned = results.len(),
            has_more = meta.has_more(),
            "query executed"
        );
        Ok(QueryResponse {
            strategy,
            results,
            meta,
            rerank: rerank_stats,
        })
    }

    /// Union of every chain level, or every scope when the request had none.
    fn candidates(
        &self,
        entry_type: EntryType,
        chain: &[ScopeDescriptor],
        include_inactive: bool,
    ) -> Result<Vec<Entry>> {
        if chain.is_empty() {
            return self.repo.list_by_scope(entry_type, None, include_inactive);
        }
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for scope in chain {
            for entry in self.repo.list_by_scope(entry_type, Some(scope), include_inactive)? {
                if seen.insert(entry.id.clone()) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    /// Narrow `candidates` with the strategy predicate and record scoring signals.
    fn apply_strategy(
        &self,
        entry_type: EntryType,
        candidates: Vec<Entry>,
        params: &QueryParams,
        request: &QueryRequest,
        ctx: &mut QueryContext,
    ) -> Result<Vec<Entry>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        // Search text always feeds the text-match signal, whatever the strategy.
        let text_hits = match (params, request.search_text()) {
            (QueryParams::Text { search, fields, mode }, _) => {
                Some(self.text_hits(entry_type, &candidates, search, fields, *mode)?)
            }
            (_, Some(search)) => Some(self.text_index.search(entry_type, search, &request.fields)?),
            (_, None) => None,
        };
        if let Some(hits) = &text_hits {
            ctx.text_hits
                .get_or_insert_with(HashSet::new)
                .extend(hits.iter().cloned());
        }

        let kept: Vec<Entry> = match params {
            QueryParams::Text { .. } => {
                let hits = text_hits.unwrap_or_default();
                candidates.into_iter().filter(|e| hits.contains(&e.id)).collect()
            }
            QueryParams::Semantic { .. } => match text_hits {
                Some(hits) if candidates.iter().any(|e| hits.contains(&e.id)) => {
                    candidates.into_iter().filter(|e| hits.contains(&e.id)).collect()
                }
                _ => candidates,
            },
            QueryParams::Relation(related) => {
                let related_ids = self.related_ids(related)?;
                ctx.related_ids.extend(related_ids.iter().cloned());
                candidates
                    .into_iter()
                    .filter(|e| related_ids.contains(&e.id))
                    .collect()
            }
            QueryParams::Tag(filter) => {
                let ids: Vec<String> = candidates.iter().map(|e| e.id.clone()).collect();
                let tags = self.repo.tags_for(entry_type, &ids)?;
                ctx.requested_tags = filter.wanted();
                let kept = candidates
                    .into_iter()
                    .filter(|e| filter.accepts(tags.get(&e.id).map_or(&[][..], |t| t.as_slice())))
                    .collect();
                ctx.entry_tags.extend(tags);
                kept
            }
            QueryParams::Date(range) => candidates
                .into_iter()
                .filter(|e| within_dates(e, range))
                .collect(),
            QueryParams::Priority(range) => candidates
                .into_iter()
                .filter(|e| {
                    e.current.payload.priority().is_some_and(|p| {
                        range.min.map_or(true, |min| p >= min)
                            && range.max.map_or(true, |max| p <= max)
                    })
                })
                .collect(),
            QueryParams::Conversation { conversation_id } => {
                let linked: HashSet<String> = self
                    .repo
                    .conversation_entries(conversation_id)?
                    .into_iter()
                    .filter(|(t, _)| *t == entry_type)
                    .map(|(_, id)| id)
                    .collect();
                candidates
                    .into_iter()
                    .filter(|e| linked.contains(&e.id))
                    .collect()
            }
            QueryParams::Default => candidates,
        };

        debug!(%entry_type, kept = kept.len(), "strategy applied");
        Ok(kept)
    }

    /// Substring searches go through the text index; fuzzy and regex searches
    /// are evaluated against the candidates directly.
    fn text_hits(
        &self,
        entry_type: EntryType,
        candidates: &[Entry],
        search: &str,
        fields: &[String],
        mode: MatchMode,
    ) -> Result<HashSet<String>> {
        if mode == MatchMode::Substring {
            return self.text_index.search(entry_type, search, fields);
        }
        let fields = resolve_fields(entry_type, fields);
        Ok(candidates
            .iter()
            .filter(|entry| {
                fields.iter().any(|field| {
                    field_value(&entry.current.payload, field)
                        .is_some_and(|text| self.matcher.matches(text, search, mode))
                })
            })
            .map(|entry| entry.id.clone())
            .collect())
    }

    fn related_ids(&self, related: &RelatedTo) -> Result<HashSet<String>> {
        let options = TraverseOptions {
            direction: related.direction.unwrap_or_default(),
            relation: related.relation,
        };
        let depth = related.depth.unwrap_or(DEFAULT_RELATION_DEPTH);
        let edges = self.graph.traverse(&related.id, depth, &options)?;
        Ok(edges
            .into_iter()
            .map(|edge| edge.related_id)
            .filter(|id| *id != related.id)
            .collect())
    }
}

fn within_dates(entry: &Entry, range: &DateRange) -> bool {
    let created = parse_timestamp(&entry.created_at);
    let updated = parse_timestamp(entry.updated_at());
    let check = |value: Option<DateTime<Utc>>,
                 after: Option<DateTime<Utc>>,
                 before: Option<DateTime<Utc>>| {
        if after.is_none() && before.is_none() {
            return true;
        }
        let Some(value) = value else {
            return false;
        };
        after.map_or(true, |a| value >= a) && before.map_or(true, |b| value <= b)
    };
    check(created, range.created_after, range.created_before)
        && check(updated, range.updated_after, range.updated_before)
}

fn paginate_offset(
    items: Vec<QueryResultItem>,
    offset: usize,
    limit: usize,
) -> (Vec<QueryResultItem>, PageMeta) {
    let page: Vec<QueryResultItem> = items.into_iter().skip(offset).take(limit).collect();
    let returned_count = page.len();
    let meta = PageMeta::Offset {
        returned_count,
        limit,
        offset,
        has_more: returned_count == limit,
    };
    (page, meta)
}

/// Order by `(created_at desc, id desc)` and return the page after `cursor`.
fn paginate_cursor(
    mut items: Vec<QueryResultItem>,
    cursor: Option<&CursorPosition>,
    limit: usize,
) -> Result<(Vec<QueryResultItem>, PageMeta)> {
    items.sort_by(|a, b| {
        b.entry
            .created_at
            .cmp(&a.entry.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    let start = match cursor {
        Some(pos) => items
            .iter()
            .position(|item| {
                (item.entry.created_at.as_str(), item.id.as_str())
                    < (pos.created_at.as_str(), pos.id.as_str())
            })
            .unwrap_or(items.len()),
        None => 0,
    };

    let remaining = items.len() - start;
    let page: Vec<QueryResultItem> = items.into_iter().skip(start).take(limit).collect();
    let has_more = remaining > page.len();
    let next_cursor = match (has_more, page.last()) {
        (true, Some(last)) => Some(encode_cursor(&CursorPosition {
            created_at: last.entry.created_at.clone(),
            id: last.id.clone(),
        })?),
        _ => None,
    };

    let meta = PageMeta::Cursor {
        returned_count: page.len(),
        has_more,
        next_cursor,
    };
    Ok((page, meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> QueryRequest {
        QueryRequest::default()
    }

    fn related() -> RelatedTo {
        RelatedTo {
            entry_type: EntryType::Tool,
            id: "t1".into(),
            relation: None,
            depth: None,
            direction: None,
            max_results: None,
        }
    }

    #[test]
    fn semantic_wins_over_relation() {
        let req = QueryRequest {
            semantic_search: true,
            related_to: Some(related()),
            search: Some("x".into()),
            ..request()
        };
        assert_eq!(infer_strategy(&req), QueryStrategy::Semantic);
    }

    #[test]
    fn empty_tag_filter_is_default() {
        let req = QueryRequest {
            tags: Some(TagFilter::default()),
            ..request()
        };
        assert_eq!(infer_strategy(&req), QueryStrategy::Default);
    }

    #[test]
    fn priority_order_is_strict() {
        let mut req = QueryRequest {
            search: Some("deploy".into()),
            conversation_id: Some("c1".into()),
            ..request()
        };
        assert_eq!(infer_strategy(&req), QueryStrategy::Conversation);

        req.priority = Some(PriorityRange::default());
        assert_eq!(infer_strategy(&req), QueryStrategy::Priority);

        req.updated_before = Some("2026-01-01".into());
        assert_eq!(infer_strategy(&req), QueryStrategy::Date);

        req.tags = Some(TagFilter {
            exclude: vec!["wip".into()],
            ..TagFilter::default()
        });
        assert_eq!(infer_strategy(&req), QueryStrategy::Tag);

        req.related_to = Some(related());
        assert_eq!(infer_strategy(&req), QueryStrategy::Relation);

        let text_only = QueryRequest {
            search: Some("deploy".into()),
            ..request()
        };
        assert_eq!(infer_strategy(&text_only), QueryStrategy::Text);

        let blank = QueryRequest {
            search: Some("   ".into()),
            ..request()
        };
        assert_eq!(infer_strategy(&blank), QueryStrategy::Default);
    }

    #[test]
    fn unknown_forced_strategy_is_rejected() {
        let req = QueryRequest {
            strategy: Some("vector".into()),
            ..request()
        };
        assert!(matches!(
            QueryParams::from_request(&req),
            Err(MemoryError::UnsupportedStrategy(ref s)) if s == "vector"
        ));
    }

    #[test]
    fn forced_strategy_needs_its_inputs() {
        let req = QueryRequest {
            strategy: Some("relation".into()),
            ..request()
        };
        assert!(matches!(
            QueryParams::from_request(&req),
            Err(MemoryError::InvalidRequest(_))
        ));

        let inverted = QueryRequest {
            priority: Some(PriorityRange {
                min: Some(90),
                max: Some(10),
            }),
            ..request()
        };
        assert!(QueryParams::from_request(&inverted).is_err());
    }

    #[test]
    fn invalid_date_bound_is_ignored() {
        let req = QueryRequest {
            created_after: Some("last tuesday".into()),
            created_before: Some("2026-02-01".into()),
            ..request()
        };
        let QueryParams::Date(range) = QueryParams::from_request(&req).unwrap() else {
            panic!("expected date params");
        };
        assert!(range.created_after.is_none());
        assert!(range.created_before.is_some());
    }

    #[test]
    fn match_mode_prefers_regex() {
        let req = QueryRequest {
            search: Some("a+".into()),
            regex: true,
            fuzzy: true,
            ..request()
        };
        let params = QueryParams::from_request(&req).unwrap();
        assert!(matches!(params, QueryParams::Text { mode: MatchMode::Regex, .. }));
    }

    #[test]
    fn tag_filter_semantics() {
        let filter = TagFilter {
            include: vec!["rust".into(), "go".into()],
            require: vec!["cli".into()],
            exclude: vec!["deprecated".into()],
        };
        let tags = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(filter.accepts(&tags(&["Rust", "cli"])));
        assert!(!filter.accepts(&tags(&["rust"])));
        assert!(!filter.accepts(&tags(&["python", "cli"])));
        assert!(!filter.accepts(&tags(&["go", "cli", "deprecated"])));
        assert_eq!(filter.wanted(), tags(&["rust", "go", "cli"]));
    }

    #[test]
    fn cursor_round_trip_and_rejection() {
        let pos = CursorPosition {
            created_at: "2026-01-01T00:00:00.000Z".into(),
            id: "abc".into(),
        };
        let encoded = encode_cursor(&pos).unwrap();
        assert!(!encoded.contains('='));
        assert_eq!(decode_cursor(&encoded).unwrap(), pos);
        assert!(matches!(
            decode_cursor("!!not base64!!"),
            Err(MemoryError::InvalidRequest(_))
        ));
        assert!(decode_cursor(&URL_SAFE_NO_PAD.encode(b"[1,2]")).is_err());
    }
}
