//! CLI `import` command: load scopes, entries, tags, relations, and
//! conversation links from a JSON document.
//!
//! Records refer to each other by a document-local `key`; generated ids are
//! never written in the file.
//!
//! ```json
//! {
//!   "orgs":     [{"key": "acme", "name": "Acme"}],
//!   "projects": [{"key": "web", "name": "Web", "org": "acme"}],
//!   "sessions": [{"key": "s1", "project": "web"}],
//!   "entries":  [{"key": "tabs", "type": "guideline", "scope": {"type": "project", "ref": "web"},
//!                 "name": "use-tabs", "content": "Indent with tabs", "priority": 80,
//!                 "tags": ["style"]}],
//!   "relations":     [{"source": "tabs", "target": "fmt", "relation": "depends_on"}],
//!   "conversations": [{"id": "conv-1", "entries": ["tabs"]}]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::MemexConfig;
use crate::memory::store;
use crate::memory::types::{
    EntryPayload, EntryType, ExperiencePayload, GuidelinePayload, KnowledgePayload,
    RelationType, ScopeDescriptor, ScopeType, ToolPayload,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportDocument {
    pub orgs: Vec<OrgRecord>,
    pub projects: Vec<ProjectRecord>,
    pub sessions: Vec<SessionRecord>,
    pub entries: Vec<EntryRecord>,
    pub relations: Vec<RelationRecord>,
    pub conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct OrgRecord {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRecord {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub org: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRecord {
    pub key: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScopeRef {
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    #[serde(default, rename = "ref")]
    pub key: Option<String>,
}

/// One entry of any type. Which optional fields apply depends on `type`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub scope: ScopeRef,
    #[serde(default, alias = "title")]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "description")]
    pub content: String,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RelationRecord {
    pub source: String,
    pub target: String,
    pub relation: RelationType,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub entries: Vec<String>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ImportSummary {
    pub scopes: usize,
    pub entries: usize,
    pub tags: usize,
    pub relations: usize,
    pub conversation_links: usize,
}

impl EntryRecord {
    fn to_payload(&self) -> Result<EntryPayload> {
        let confidence = self.confidence.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&confidence) {
            bail!("entry {}: confidence must be between 0.0 and 1.0", self.key);
        }
        Ok(match self.entry_type {
            EntryType::Guideline => {
                let priority = self.priority.unwrap_or(50);
                if !(0..=100).contains(&priority) {
                    bail!("entry {}: priority must be between 0 and 100", self.key);
                }
                EntryPayload::Guideline(GuidelinePayload {
                    name: self.name.clone(),
                    category: self.category.clone(),
                    priority,
                    content: self.content.clone(),
                    rationale: self.rationale.clone(),
                })
            }
            EntryType::Knowledge => EntryPayload::Knowledge(KnowledgePayload {
                title: self.name.clone(),
                category: self.category.clone(),
                content: self.content.clone(),
                source: self.source.clone(),
                confidence,
            }),
            EntryType::Tool => EntryPayload::Tool(ToolPayload {
                name: self.name.clone(),
                category: self.category.clone(),
                description: self.content.clone(),
            }),
            EntryType::Experience => EntryPayload::Experience(ExperiencePayload {
                title: self.name.clone(),
                category: self.category.clone(),
                content: self.content.clone(),
                scenario: self.scenario.clone(),
                outcome: self.outcome.clone(),
                confidence,
            }),
        })
    }
}

/// Maps document keys to generated ids.
#[derive(Default)]
struct KeyMap {
    orgs: HashMap<String, String>,
    projects: HashMap<String, String>,
    sessions: HashMap<String, String>,
    entries: HashMap<String, String>,
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, key: &str) -> Result<&'a str> {
    map.get(key)
        .map(String::as_str)
        .with_context(|| format!("unknown {kind} key: {key}"))
}

impl KeyMap {
    fn scope(&self, scope: &ScopeRef) -> Result<ScopeDescriptor> {
        let map = match scope.scope_type {
            ScopeType::Global => return Ok(ScopeDescriptor::global()),
            ScopeType::Org => &self.orgs,
            ScopeType::Project => &self.projects,
            ScopeType::Session => &self.sessions,
        };
        let key = scope
            .key
            .as_deref()
            .with_context(|| format!("{} scope needs a ref", scope.scope_type))?;
        let id = lookup(map, scope.scope_type.as_str(), key)?;
        Ok(ScopeDescriptor::new(scope.scope_type, id))
    }
}

/// Write a whole document. Stops at the first invalid record; earlier
/// records stay written.
pub fn import_document(conn: &mut Connection, doc: &ImportDocument) -> Result<ImportSummary> {
    let mut keys = KeyMap::default();
    let mut summary = ImportSummary::default();

    for org in &doc.orgs {
        let id = store::create_org(conn, &org.name)?;
        keys.orgs.insert(org.key.clone(), id);
        summary.scopes += 1;
    }
    for project in &doc.projects {
        let org_id = match &project.org {
            Some(key) => Some(lookup(&keys.orgs, "org", key)?.to_string()),
            None => None,
        };
        let id = store::create_project(conn, &project.name, org_id.as_deref())?;
        keys.projects.insert(project.key.clone(), id);
        summary.scopes += 1;
    }
    for session in &doc.sessions {
        let project_id = match &session.project {
            Some(key) => Some(lookup(&keys.projects, "project", key)?.to_string()),
            None => None,
        };
        let id = store::create_session(conn, project_id.as_deref(), session.name.as_deref())?;
        keys.sessions.insert(session.key.clone(), id);
        summary.scopes += 1;
    }

    for record in &doc.entries {
        let scope = keys.scope(&record.scope)?;
        let payload = record.to_payload()?;
        let id = match &record.created_at {
            Some(created_at) => store::create_entry_at(conn, &scope, &payload, created_at)?,
            None => store::create_entry(conn, &scope, &payload)?,
        };
        for tag in &record.tags {
            store::add_tag(conn, &id, tag)?;
            summary.tags += 1;
        }
        if !record.active {
            store::set_active(conn, &id, false)?;
        }
        keys.entries.insert(record.key.clone(), id);
        summary.entries += 1;
    }

    for relation in &doc.relations {
        let source = lookup(&keys.entries, "entry", &relation.source)?;
        let target = lookup(&keys.entries, "entry", &relation.target)?;
        if store::add_relation(conn, source, target, relation.relation)? {
            summary.relations += 1;
        }
    }

    for conversation in &doc.conversations {
        for key in &conversation.entries {
            let entry_id = lookup(&keys.entries, "entry", key)?;
            store::link_conversation(conn, &conversation.id, entry_id)?;
            summary.conversation_links += 1;
        }
    }

    tracing::info!(
        entries = summary.entries,
        relations = summary.relations,
        "import complete"
    );
    Ok(summary)
}

/// Import a JSON document into the configured database.
pub fn import(config: &MemexConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;
    let doc: ImportDocument = serde_json::from_str(&json).context("failed to parse import JSON")?;

    let db_path = config.resolved_db_path();
    let mut conn = crate::db::open_database(&db_path)?;

    println!(
        "Importing {} entries and {} relations...",
        doc.entries.len(),
        doc.relations.len()
    );
    let summary = import_document(&mut conn, &doc)?;

    println!(
        "Import complete: {} scopes, {} entries, {} tags, {} relations, {} conversation links.",
        summary.scopes, summary.entries, summary.tags, summary.relations, summary.conversation_links
    );
    Ok(())
}
