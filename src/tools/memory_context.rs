//! MCP `memory_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::memory_query::{parse_types, ScopeParam};
use crate::context::assemble::{AssembleRequest, Purpose};

/// Parameters for the `memory_context` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryContextParams {
    #[schemars(description = "Scope to assemble context for")]
    pub scope: ScopeParam,

    #[schemars(description = "'session_start' (default), 'tool_injection', or 'query'. Sets the default token budget.")]
    pub purpose: Option<String>,

    #[schemars(description = "Optional text to focus retrieval on")]
    pub search: Option<String>,

    #[schemars(description = "Task intent such as 'lookup', 'debug', or 'refactor'. Scales the budget.")]
    pub intent: Option<String>,

    #[schemars(description = "'markdown' (default), 'json', or 'natural_language'")]
    pub format: Option<String>,

    #[schemars(description = "Token budget, clamped to the purpose's range")]
    pub max_tokens: Option<usize>,

    #[schemars(description = "Entry types to include. Defaults to all.")]
    pub types: Option<Vec<String>>,
}

impl MemoryContextParams {
    pub fn into_request(self) -> Result<AssembleRequest, String> {
        let purpose = match self.purpose.as_deref() {
            Some(p) => p.parse::<Purpose>()?,
            None => Purpose::default(),
        };
        let mut request = AssembleRequest::new(self.scope.to_descriptor()?, purpose);
        request.search = self.search;
        request.intent = self.intent;
        request.format = self.format.as_deref().map(str::parse).transpose()?;
        request.max_tokens = self.max_tokens;
        request.types = parse_types(self.types.as_deref())?;
        Ok(request)
    }
}
