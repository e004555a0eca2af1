//! Context assembly: retrieval plus the budget pipeline in one call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::budget::Budget;
use super::compression::CompressionLevel;
use super::format::OutputFormat;
use super::staleness::StalenessWarning;
use super::{ContextBudgetManager, ContextEntry, ProcessStats};
use crate::error::Result;
use crate::memory::query::{QueryRequest, QueryRouter};
use crate::memory::types::{EntryType, ScopeDescriptor};

/// Why context is being assembled; each purpose has its own token window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    #[default]
    SessionStart,
    ToolInjection,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenWindow {
    pub default: usize,
    pub min: usize,
    pub max: usize,
}

impl Purpose {
    pub fn window(&self) -> TokenWindow {
        match self {
            Self::SessionStart => TokenWindow {
                default: 2000,
                min: 500,
                max: 4000,
            },
            Self::ToolInjection => TokenWindow {
                default: 1600,
                min: 200,
                max: 3200,
            },
            Self::Query => TokenWindow {
                default: 4000,
                min: 1000,
                max: 8000,
            },
        }
    }

    /// Requested tokens, or the purpose default, clamped to the window.
    pub fn resolve_tokens(&self, requested: Option<usize>) -> usize {
        let window = self.window();
        requested.unwrap_or(window.default).clamp(window.min, window.max)
    }
}

impl std::str::FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "session_start" => Ok(Self::SessionStart),
            "tool_injection" => Ok(Self::ToolInjection),
            "query" => Ok(Self::Query),
            _ => Err(format!("unknown purpose: {s}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembleRequest {
    pub scope: ScopeDescriptor,
    #[serde(default)]
    pub purpose: Purpose,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// Empty means every type.
    #[serde(default)]
    pub types: Vec<EntryType>,
}

impl AssembleRequest {
    pub fn new(scope: ScopeDescriptor, purpose: Purpose) -> Self {
        Self {
            scope,
            purpose,
            search: None,
            intent: None,
            format: None,
            max_tokens: None,
            types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembleResponse {
    pub content: String,
    pub format: OutputFormat,
    pub stats: ProcessStats,
    pub budget_info: Budget,
    pub compression_level: CompressionLevel,
    pub staleness_warnings: Vec<StalenessWarning>,
    pub included_ids: Vec<String>,
    pub excluded_ids: Vec<String>,
}

pub struct ContextAssembler {
    router: Arc<QueryRouter>,
    manager: Arc<ContextBudgetManager>,
}

impl ContextAssembler {
    pub fn new(router: Arc<QueryRouter>, manager: Arc<ContextBudgetManager>) -> Self {
        Self { router, manager }
    }

    pub fn assemble_context(&self, request: &AssembleRequest) -> Result<AssembleResponse> {
        self.assemble_context_at(request, Utc::now())
    }

    /// [`assemble_context`](Self::assemble_context) with a fixed clock.
    pub fn assemble_context_at(
        &self,
        request: &AssembleRequest,
        now: DateTime<Utc>,
    ) -> Result<AssembleResponse> {
        request.scope.validate()?;
        let intent = request.intent.as_deref();
        let max_tokens = match request.max_tokens {
            Some(requested) => request.purpose.resolve_tokens(Some(requested)),
            None => {
                let scaled = self
                    .manager
                    .budget_calculator()
                    .scale(intent, request.purpose.window().default);
                request.purpose.resolve_tokens(Some(scaled))
            }
        };
        let budget = self
            .manager
            .budget_calculator()
            .calculate(intent, Some(max_tokens));

        let types = if request.types.is_empty() {
            EntryType::ALL.to_vec()
        } else {
            request.types.clone()
        };

        // One query per type so each type is capped by its own share.
        let mut entries = Vec::new();
        for entry_type in types {
            let cap = budget.max_entries.get(&entry_type).copied().unwrap_or(1);
            let query = QueryRequest {
                types: vec![entry_type],
                scope: Some(request.scope.clone().inheriting()),
                search: request.search.clone(),
                limit: Some(cap),
                ..QueryRequest::default()
            };
            let response = self.router.execute_query_at(&query, now)?;
            entries.extend(response.results.iter().map(ContextEntry::from));
        }

        let result = self
            .manager
            .process_at(entries, intent, request.format, Some(max_tokens), now);

        info!(
            purpose = ?request.purpose,
            max_tokens,
            included = result.included.len(),
            excluded = result.excluded.len(),
            "context assembled"
        );
        Ok(AssembleResponse {
            content: result.content,
            format: result.format,
            stats: result.stats,
            budget_info: result.budget,
            compression_level: result.compression_level,
            staleness_warnings: result.staleness_warnings,
            included_ids: result.included.iter().map(|e| e.id.clone()).collect(),
            excluded_ids: result.excluded.iter().map(|e| e.id.clone()).collect(),
        })
    }
}
