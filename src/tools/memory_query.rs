//! MCP `memory_query` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::query::{PriorityRange, QueryRequest, RelatedTo, TagFilter};
use crate::memory::types::{EntryType, RelationDirection, ScopeDescriptor};

/// Scope selector shared by both tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScopeParam {
    #[schemars(description = "Scope level: 'global', 'org', 'project', or 'session'")]
    pub r#type: String,

    #[schemars(description = "Scope id. Required for every level except 'global'.")]
    pub id: Option<String>,

    #[schemars(description = "Also consult broader scopes (session → project → org → global). Defaults to true.")]
    pub inherit: Option<bool>,
}

impl ScopeParam {
    pub fn to_descriptor(&self) -> Result<ScopeDescriptor, String> {
        let scope = ScopeDescriptor {
            scope_type: self.r#type.parse()?,
            id: self.id.clone(),
            inherit: self.inherit.unwrap_or(true),
        };
        scope.validate().map_err(|e| e.to_string())?;
        Ok(scope)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelatedToParam {
    #[schemars(description = "Type of the anchor entry")]
    pub r#type: String,

    #[schemars(description = "Id of the anchor entry")]
    pub id: String,

    #[schemars(description = "Only follow this relation: applies_to, depends_on, conflicts_with, related_to, parent_task, subtask_of")]
    pub relation: Option<String>,

    #[schemars(description = "Hops to follow (1-5). Defaults to 1.")]
    pub depth: Option<u32>,

    #[schemars(description = "'forward', 'backward', or 'both' (default)")]
    pub direction: Option<String>,

    #[schemars(description = "Cap on related entries returned")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TagParam {
    #[schemars(description = "Entry must carry at least one of these tags")]
    pub include: Option<Vec<String>>,

    #[schemars(description = "Entry must carry all of these tags")]
    pub require: Option<Vec<String>>,

    #[schemars(description = "Entry must carry none of these tags")]
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PriorityParam {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// Parameters for the `memory_query` MCP tool.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryQueryParams {
    #[schemars(description = "Entry types to search: 'guideline', 'knowledge', 'tool', 'experience'. Defaults to all.")]
    pub types: Option<Vec<String>>,

    #[schemars(description = "Scope to search. Omit to search every scope.")]
    pub scope: Option<ScopeParam>,

    #[schemars(description = "Force a strategy: text, semantic, relation, tag, date, priority, conversation, default. Inferred when omitted.")]
    pub strategy: Option<String>,

    #[schemars(description = "Free-text search string")]
    pub search: Option<String>,

    #[schemars(description = "Fields to match 'search' against, e.g. name, content, rationale")]
    pub fields: Option<Vec<String>>,

    #[schemars(description = "Tolerate typos when matching 'search'")]
    pub fuzzy: Option<bool>,

    #[schemars(description = "Treat 'search' as a regular expression")]
    pub regex: Option<bool>,

    #[schemars(description = "Rerank text hits by embedding similarity")]
    pub semantic_search: Option<bool>,

    #[schemars(description = "Return entries related to this anchor")]
    pub related_to: Option<RelatedToParam>,

    #[schemars(description = "Tag filter")]
    pub tags: Option<TagParam>,

    #[schemars(description = "RFC 3339 lower bound on creation time (inclusive)")]
    pub created_after: Option<String>,

    #[schemars(description = "RFC 3339 upper bound on creation time (inclusive)")]
    pub created_before: Option<String>,

    #[schemars(description = "RFC 3339 lower bound on last update (inclusive)")]
    pub updated_after: Option<String>,

    #[schemars(description = "RFC 3339 upper bound on last update (inclusive)")]
    pub updated_before: Option<String>,

    #[schemars(description = "Guideline priority range (0-100)")]
    pub priority: Option<PriorityParam>,

    #[schemars(description = "Only entries linked to this conversation")]
    pub conversation_id: Option<String>,

    #[schemars(description = "Page size. Defaults to 20, capped at 100.")]
    pub limit: Option<usize>,

    #[schemars(description = "Offset for offset pagination")]
    pub offset: Option<usize>,

    #[schemars(description = "Cursor returned as meta.nextCursor by a previous call")]
    pub cursor: Option<String>,

    #[schemars(description = "Use cursor pagination for the first page")]
    pub use_cursor: Option<bool>,

    #[schemars(description = "Include deactivated entries")]
    pub include_inactive: Option<bool>,
}

pub fn parse_types(types: Option<&[String]>) -> Result<Vec<EntryType>, String> {
    types
        .unwrap_or_default()
        .iter()
        .map(|t| t.parse::<EntryType>())
        .collect()
}

fn parse_direction(value: &str) -> Result<RelationDirection, String> {
    match value {
        "forward" => Ok(RelationDirection::Forward),
        "backward" => Ok(RelationDirection::Backward),
        "both" => Ok(RelationDirection::Both),
        other => Err(format!("unknown direction: {other}")),
    }
}

impl MemoryQueryParams {
    pub fn into_request(self) -> Result<QueryRequest, String> {
        let related_to = match self.related_to {
            Some(r) => Some(RelatedTo {
                entry_type: r.r#type.parse()?,
                id: r.id,
                relation: r.relation.as_deref().map(str::parse).transpose()?,
                depth: r.depth,
                direction: r.direction.as_deref().map(parse_direction).transpose()?,
                max_results: r.max_results,
            }),
            None => None,
        };

        Ok(QueryRequest {
            types: parse_types(self.types.as_deref())?,
            scope: self.scope.as_ref().map(ScopeParam::to_descriptor).transpose()?,
            strategy: self.strategy,
            search: self.search,
            fields: self.fields.unwrap_or_default(),
            fuzzy: self.fuzzy.unwrap_or(false),
            regex: self.regex.unwrap_or(false),
            semantic_search: self.semantic_search.unwrap_or(false),
            related_to,
            tags: self.tags.map(|t| TagFilter {
                include: t.include.unwrap_or_default(),
                require: t.require.unwrap_or_default(),
                exclude: t.exclude.unwrap_or_default(),
            }),
            created_after: self.created_after,
            created_before: self.created_before,
            updated_after: self.updated_after,
            updated_before: self.updated_before,
            priority: self.priority.map(|p| PriorityRange {
                min: p.min,
                max: p.max,
            }),
            conversation_id: self.conversation_id,
            limit: self.limit,
            offset: self.offset,
            cursor: self.cursor,
            use_cursor: self.use_cursor.unwrap_or(false),
            include_inactive: self.include_inactive.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{RelationType, ScopeType};

    #[test]
    fn converts_nested_params() {
        let params: MemoryQueryParams = serde_json::from_str(
            r#"{
                "types": ["guideline", "tool"],
                "scope": {"type": "project", "id": "p1"},
                "relatedTo": {"type": "tool", "id": "t1", "relation": "depends_on", "direction": "forward"},
                "tags": {"include": ["rust"]}
            }"#,
        )
        .unwrap();
        let request = params.into_request().unwrap();
        assert_eq!(request.types, vec![EntryType::Guideline, EntryType::Tool]);
        let scope = request.scope.unwrap();
        assert_eq!(scope.scope_type, ScopeType::Project);
        assert!(scope.inherit);
        let related = request.related_to.unwrap();
        assert_eq!(related.relation, Some(RelationType::DependsOn));
        assert_eq!(related.direction, Some(RelationDirection::Forward));
        assert_eq!(request.tags.unwrap().include, vec!["rust".to_string()]);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_type = MemoryQueryParams {
            types: Some(vec!["episodic".into()]),
            ..MemoryQueryParams::default()
        };
        assert!(bad_type.into_request().is_err());

        let missing_id = MemoryQueryParams {
            scope: Some(ScopeParam {
                r#type: "session".into(),
                id: None,
                inherit: None,
            }),
            ..MemoryQueryParams::default()
        };
        let err = missing_id.into_request().unwrap_err();
        assert!(err.contains("session"));
    }
}
