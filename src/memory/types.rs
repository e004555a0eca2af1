//! Core type definitions.
//!
//! Defines [`EntryType`] (the four kinds of memory entry), [`ScopeType`] and
//! [`ScopeDescriptor`] (the global/org/project/session hierarchy), [`Entry`]
//! with its immutable [`Version`] history, and [`QueryResultItem`].

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// The four kinds of memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Rules and conventions an agent should follow.
    Guideline,
    /// Facts, decisions, and reference material.
    Knowledge,
    /// Commands, scripts, and callable tools.
    Tool,
    /// Lessons learned from past attempts.
    Experience,
}

impl EntryType {
    pub const ALL: [EntryType; 4] = [
        EntryType::Guideline,
        EntryType::Knowledge,
        EntryType::Tool,
        EntryType::Experience,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guideline => "guideline",
            Self::Knowledge => "knowledge",
            Self::Tool => "tool",
            Self::Experience => "experience",
        }
    }

    /// Plural heading used when rendering grouped output.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Guideline => "Guidelines",
            Self::Knowledge => "Knowledge",
            Self::Tool => "Tools",
            Self::Experience => "Experiences",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "guideline" | "guidelines" => Ok(Self::Guideline),
            "knowledge" => Ok(Self::Knowledge),
            "tool" | "tools" => Ok(Self::Tool),
            "experience" | "experiences" => Ok(Self::Experience),
            _ => Err(format!("unknown entry type: {s}")),
        }
    }
}

/// A level of the scope hierarchy, most specific last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Global,
    Org,
    Project,
    Session,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Org => "org",
            Self::Project => "project",
            Self::Session => "session",
        }
    }
}

impl std::fmt::Display for ScopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScopeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "org" => Ok(Self::Org),
            "project" => Ok(Self::Project),
            "session" => Ok(Self::Session),
            _ => Err(format!("unknown scope type: {s}")),
        }
    }
}

/// A scope to query, plus whether broader scopes are consulted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub inherit: bool,
}

impl ScopeDescriptor {
    pub fn global() -> Self {
        Self {
            scope_type: ScopeType::Global,
            id: None,
            inherit: false,
        }
    }

    pub fn new(scope_type: ScopeType, id: impl Into<String>) -> Self {
        Self {
            scope_type,
            id: Some(id.into()),
            inherit: false,
        }
    }

    pub fn inheriting(mut self) -> Self {
        self.inherit = true;
        self
    }

    /// Reject non-global descriptors without an id.
    pub fn validate(&self) -> Result<()> {
        let missing = self.id.as_deref().map_or(true, str::is_empty);
        if self.scope_type != ScopeType::Global && missing {
            return Err(MemoryError::MissingScopeId(self.scope_type.to_string()));
        }
        Ok(())
    }

    /// True when `scope_type`/`scope_id` from a stored entry lie at this exact level.
    pub fn contains(&self, scope_type: ScopeType, scope_id: Option<&str>) -> bool {
        if self.scope_type != scope_type {
            return false;
        }
        match self.scope_type {
            ScopeType::Global => true,
            _ => self.id.as_deref() == scope_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidelinePayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 0–100, higher wins.
    pub priority: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgePayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperiencePayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub confidence: f64,
}

/// Type-specific, versioned content of an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryPayload {
    Guideline(GuidelinePayload),
    Knowledge(KnowledgePayload),
    Tool(ToolPayload),
    Experience(ExperiencePayload),
}

impl EntryPayload {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Guideline(_) => EntryType::Guideline,
            Self::Knowledge(_) => EntryType::Knowledge,
            Self::Tool(_) => EntryType::Tool,
            Self::Experience(_) => EntryType::Experience,
        }
    }

    /// Name for guidelines and tools, title for knowledge and experiences.
    pub fn title(&self) -> &str {
        match self {
            Self::Guideline(g) => &g.name,
            Self::Knowledge(k) => &k.title,
            Self::Tool(t) => &t.name,
            Self::Experience(e) => &e.title,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Guideline(g) => &g.content,
            Self::Knowledge(k) => &k.content,
            Self::Tool(t) => &t.description,
            Self::Experience(e) => &e.content,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Guideline(g) => g.category.as_deref(),
            Self::Knowledge(k) => k.category.as_deref(),
            Self::Tool(t) => t.category.as_deref(),
            Self::Experience(e) => e.category.as_deref(),
        }
    }

    /// Secondary descriptive field: rationale, source, or scenario.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Guideline(g) => g.rationale.as_deref(),
            Self::Knowledge(k) => k.source.as_deref(),
            Self::Tool(_) => None,
            Self::Experience(e) => e.scenario.as_deref(),
        }
    }

    /// Only guidelines carry a priority.
    pub fn priority(&self) -> Option<i64> {
        match self {
            Self::Guideline(g) => Some(g.priority),
            _ => None,
        }
    }
}

/// An immutable snapshot of an entry's content. `version_num` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Version {
    pub id: String,
    pub entry_id: String,
    pub version_num: u32,
    pub payload: EntryPayload,
    pub created_at: String,
}

/// A memory entry hydrated with its current version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: String,
    pub scope_type: ScopeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<String>,
    pub current: Version,
}

impl Entry {
    pub fn entry_type(&self) -> EntryType {
        self.current.payload.entry_type()
    }

    pub fn title(&self) -> &str {
        self.current.payload.title()
    }

    pub fn content(&self) -> &str {
        self.current.payload.content()
    }

    /// When the current version was written.
    pub fn updated_at(&self) -> &str {
        &self.current.created_at
    }
}

/// One ranked query hit.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResultItem {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub id: String,
    pub score: f64,
    #[serde(rename = "payload")]
    pub entry: Entry,
}

impl QueryResultItem {
    pub fn new(entry: Entry, score: f64) -> Self {
        Self {
            entry_type: entry.entry_type(),
            id: entry.id.clone(),
            score,
            entry,
        }
    }
}

/// Sort by score descending, breaking ties by id so output is deterministic.
pub fn sort_by_score(items: &mut [QueryResultItem]) {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Labels for edges between entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    AppliesTo,
    DependsOn,
    ConflictsWith,
    RelatedTo,
    ParentTask,
    SubtaskOf,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppliesTo => "applies_to",
            Self::DependsOn => "depends_on",
            Self::ConflictsWith => "conflicts_with",
            Self::RelatedTo => "related_to",
            Self::ParentTask => "parent_task",
            Self::SubtaskOf => "subtask_of",
        }
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "applies_to" => Ok(Self::AppliesTo),
            "depends_on" => Ok(Self::DependsOn),
            "conflicts_with" => Ok(Self::ConflictsWith),
            "related_to" => Ok(Self::RelatedTo),
            "parent_task" => Ok(Self::ParentTask),
            "subtask_of" => Ok(Self::SubtaskOf),
            _ => Err(format!("unknown relation type: {s}")),
        }
    }
}

/// Which edges a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationDirection {
    Forward,
    Backward,
    #[default]
    Both,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_round_trips_through_str() {
        for t in EntryType::ALL {
            assert_eq!(t.as_str().parse::<EntryType>().unwrap(), t);
        }
        assert!("episodic".parse::<EntryType>().is_err());
    }

    #[test]
    fn non_global_scope_requires_id() {
        let scope = ScopeDescriptor {
            scope_type: ScopeType::Project,
            id: None,
            inherit: true,
        };
        assert!(matches!(
            scope.validate(),
            Err(MemoryError::MissingScopeId(ref s)) if s == "project"
        ));
        assert!(ScopeDescriptor::global().validate().is_ok());
        assert!(ScopeDescriptor::new(ScopeType::Session, "s1").validate().is_ok());
    }

    #[test]
    fn sort_breaks_ties_by_id() {
        let make = |id: &str, score: f64| QueryResultItem {
            entry_type: EntryType::Knowledge,
            id: id.into(),
            score,
            entry: Entry {
                id: id.into(),
                scope_type: ScopeType::Global,
                scope_id: None,
                is_active: true,
                created_at: "2026-01-01T00:00:00Z".into(),
                last_accessed_at: None,
                current: Version {
                    id: format!("{id}-v1"),
                    entry_id: id.into(),
                    version_num: 1,
                    payload: EntryPayload::Knowledge(KnowledgePayload {
                        title: id.into(),
                        category: None,
                        content: String::new(),
                        source: None,
                        confidence: 1.0,
                    }),
                    created_at: "2026-01-01T00:00:00Z".into(),
                },
            },
        };
        let mut items = vec![make("b", 1.0), make("c", 2.0), make("a", 1.0)];
        sort_by_score(&mut items);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
