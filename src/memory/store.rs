//! SQLite-backed collaborators and the write path.
//!
//! [`SqliteStore`] implements [`Repository`], [`ScopeHierarchy`],
//! [`TextIndexBackend`] and [`RelationGraph`] over one shared connection.
//! The free functions below create scopes, entries, versions, tags, relations
//! and conversation links; every version write keeps `entries_fts` in sync.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::error::{MemoryError, Result};
use crate::memory::repository::{
    RelatedEdge, RelationGraph, Repository, ScopeHierarchy, TraverseOptions,
};
use crate::memory::text_index::TextIndexBackend;
use crate::memory::types::{
    Entry, EntryPayload, EntryType, ExperiencePayload, GuidelinePayload, KnowledgePayload,
    RelationDirection, RelationType, ScopeDescriptor, ScopeType, ToolPayload, Version,
};

/// Traversal depth is clamped to this range.
const MIN_DEPTH: u32 = 1;
const MAX_DEPTH: u32 = 5;

const ENTRY_SELECT: &str = "SELECT e.id, e.entry_type, e.scope_type, e.scope_id, e.is_active, \
     e.created_at, e.last_accessed_at, v.id, v.version_num, v.title, v.category, v.content, \
     v.detail, v.outcome, v.priority, v.confidence, v.created_at \
     FROM entries e JOIN entry_versions v ON v.id = e.current_version_id";

const VERSION_SELECT: &str = "SELECT e.entry_type, v.id, v.entry_id, v.version_num, v.title, \
     v.category, v.content, v.detail, v.outcome, v.priority, v.confidence, v.created_at \
     FROM entry_versions v JOIN entries e ON e.id = v.entry_id";

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Flattened version columns; see the `entry_versions` DDL.
struct VersionColumns<'a> {
    title: &'a str,
    category: Option<&'a str>,
    content: &'a str,
    detail: Option<&'a str>,
    outcome: Option<&'a str>,
    priority: Option<i64>,
    confidence: Option<f64>,
}

fn version_columns(payload: &EntryPayload) -> VersionColumns<'_> {
    let outcome = match payload {
        EntryPayload::Experience(e) => e.outcome.as_deref(),
        _ => None,
    };
    let confidence = match payload {
        EntryPayload::Knowledge(k) => Some(k.confidence),
        EntryPayload::Experience(e) => Some(e.confidence),
        _ => None,
    };
    VersionColumns {
        title: payload.title(),
        category: payload.category(),
        content: payload.content(),
        detail: payload.detail(),
        outcome,
        priority: payload.priority(),
        confidence,
    }
}

/// Rebuild a payload from columns starting at `base` (title, category,
/// content, detail, outcome, priority, confidence).
fn payload_from_row(entry_type: EntryType, row: &Row<'_>, base: usize) -> rusqlite::Result<EntryPayload> {
    let title: String = row.get(base)?;
    let category: Option<String> = row.get(base + 1)?;
    let content: String = row.get(base + 2)?;
    let detail: Option<String> = row.get(base + 3)?;
    let outcome: Option<String> = row.get(base + 4)?;
    let priority: Option<i64> = row.get(base + 5)?;
    let confidence: Option<f64> = row.get(base + 6)?;

    Ok(match entry_type {
        EntryType::Guideline => EntryPayload::Guideline(GuidelinePayload {
            name: title,
            category,
            priority: priority.unwrap_or(50),
            content,
            rationale: detail,
        }),
        EntryType::Knowledge => EntryPayload::Knowledge(KnowledgePayload {
            title,
            category,
            content,
            source: detail,
            confidence: confidence.unwrap_or(1.0),
        }),
        EntryType::Tool => EntryPayload::Tool(ToolPayload {
            name: title,
            category,
            description: content,
        }),
        EntryType::Experience => EntryPayload::Experience(ExperiencePayload {
            title,
            category,
            content,
            scenario: detail,
            outcome,
            confidence: confidence.unwrap_or(1.0),
        }),
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let id: String = row.get(0)?;
    let entry_type: EntryType = parse_column(1, row.get(1)?)?;
    let scope_type: ScopeType = parse_column(2, row.get(2)?)?;
    let version_num: i64 = row.get(8)?;

    Ok(Entry {
        scope_type,
        scope_id: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        last_accessed_at: row.get(6)?,
        current: Version {
            id: row.get(7)?,
            entry_id: id.clone(),
            version_num: version_num as u32,
            payload: payload_from_row(entry_type, row, 9)?,
            created_at: row.get(16)?,
        },
        id,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<(EntryType, String, RelationType)> {
    Ok((
        parse_column(0, row.get(0)?)?,
        row.get(1)?,
        parse_column(2, row.get(2)?)?,
    ))
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<Version> {
    let entry_type: EntryType = parse_column(0, row.get(0)?)?;
    let version_num: i64 = row.get(3)?;
    Ok(Version {
        id: row.get(1)?,
        entry_id: row.get(2)?,
        version_num: version_num as u32,
        payload: payload_from_row(entry_type, row, 4)?,
        created_at: row.get(11)?,
    })
}

/// Map a per-type field name onto its `entries_fts` / `entry_versions` column.
fn index_column(field: &str) -> Option<&'static str> {
    match field {
        "name" | "title" => Some("title"),
        "content" | "description" => Some("content"),
        "rationale" | "source" | "scenario" => Some("detail"),
        _ => None,
    }
}

fn index_columns(fields: &[&'static str]) -> Vec<&'static str> {
    let mut columns = Vec::new();
    for column in fields.iter().filter_map(|f| index_column(f)) {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    if columns.is_empty() {
        columns = vec!["title", "content", "detail"];
    }
    columns
}

/// Escape `\`, `%` and `_` so LIKE treats them literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The SQLite implementation of every storage collaborator.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self::from_shared(Arc::new(Mutex::new(conn)))
    }

    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn shared(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MemoryError::Other(anyhow::anyhow!("db lock poisoned: {e}")))
    }
}

impl Repository for SqliteStore {
    fn get_by_id(&self, entry_type: EntryType, id: &str) -> Result<Option<Entry>> {
        let conn = self.lock()?;
        let sql = format!("{ENTRY_SELECT} WHERE e.id = ?1 AND e.entry_type = ?2");
        Ok(conn
            .query_row(&sql, params![id, entry_type.as_str()], entry_from_row)
            .optional()?)
    }

    fn list_by_scope(
        &self,
        entry_type: EntryType,
        scope: Option<&ScopeDescriptor>,
        include_inactive: bool,
    ) -> Result<Vec<Entry>> {
        let conn = self.lock()?;
        let sql = format!(
            "{ENTRY_SELECT} WHERE e.entry_type = ?1 \
             AND (?2 IS NULL OR (e.scope_type = ?2 AND e.scope_id IS ?3)) \
             AND (?4 OR e.is_active = 1) \
             ORDER BY e.created_at DESC, e.id DESC"
        );
        let (scope_type, scope_id) = match scope {
            Some(s) if s.scope_type == ScopeType::Global => (Some(s.scope_type.as_str()), None),
            Some(s) => (Some(s.scope_type.as_str()), s.id.as_deref()),
            None => (None, None),
        };
        let mut stmt = conn.prepare_cached(&sql)?;
        let entries = stmt
            .query_map(
                params![entry_type.as_str(), scope_type, scope_id, include_inactive],
                entry_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn get_history(&self, entry_type: EntryType, id: &str) -> Result<Vec<Version>> {
        let conn = self.lock()?;
        let sql = format!(
            "{VERSION_SELECT} WHERE v.entry_id = ?1 AND e.entry_type = ?2 ORDER BY v.version_num"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let versions = stmt
            .query_map(params![id, entry_type.as_str()], version_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    fn find_by_name(
        &self,
        entry_type: EntryType,
        name: &str,
        scope: &ScopeDescriptor,
    ) -> Result<Option<Entry>> {
        let conn = self.lock()?;
        let sql = format!(
            "{ENTRY_SELECT} WHERE e.entry_type = ?1 AND e.scope_type = ?2 AND e.scope_id IS ?3 \
             AND e.is_active = 1 AND v.title = ?4 ORDER BY e.created_at DESC LIMIT 1"
        );
        let scope_id = match scope.scope_type {
            ScopeType::Global => None,
            _ => scope.id.as_deref(),
        };
        Ok(conn
            .query_row(
                &sql,
                params![entry_type.as_str(), scope.scope_type.as_str(), scope_id, name],
                entry_from_row,
            )
            .optional()?)
    }

    fn tags_for(
        &self,
        entry_type: EntryType,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT t.name FROM entry_tags et \
             JOIN tags t ON t.id = et.tag_id \
             JOIN entries e ON e.id = et.entry_id \
             WHERE et.entry_id = ?1 AND e.entry_type = ?2 ORDER BY t.name",
        )?;

        let mut tags = HashMap::new();
        for id in ids {
            let names = stmt
                .query_map(params![id, entry_type.as_str()], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if !names.is_empty() {
                tags.insert(id.clone(), names);
            }
        }
        Ok(tags)
    }

    fn conversation_entries(&self, conversation_id: &str) -> Result<Vec<(EntryType, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT e.entry_type, e.id FROM conversation_entries c \
             JOIN entries e ON e.id = c.entry_id \
             WHERE c.conversation_id = ?1 ORDER BY c.linked_at, e.id",
        )?;
        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok((parse_column::<EntryType>(0, row.get(0)?)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl ScopeHierarchy for SqliteStore {
    fn parent_of(&self, scope: &ScopeDescriptor) -> Result<Option<ScopeDescriptor>> {
        let (sql, parent_type) = match scope.scope_type {
            ScopeType::Session => ("SELECT project_id FROM sessions WHERE id = ?1", ScopeType::Project),
            ScopeType::Project => ("SELECT org_id FROM projects WHERE id = ?1", ScopeType::Org),
            ScopeType::Org | ScopeType::Global => return Ok(None),
        };
        let Some(id) = scope.id.as_deref() else {
            return Ok(None);
        };

        let conn = self.lock()?;
        let parent: Option<Option<String>> = conn
            .query_row(sql, params![id], |row| row.get(0))
            .optional()?;
        Ok(parent
            .flatten()
            .map(|parent_id| ScopeDescriptor::new(parent_type, parent_id)))
    }
}

impl TextIndexBackend for SqliteStore {
    fn query(
        &self,
        entry_type: EntryType,
        query: &str,
        fields: &[&'static str],
    ) -> Result<HashSet<String>> {
        let columns = index_columns(fields);
        let expression = format!("{{{}}} : ({query})", columns.join(" "));

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT entry_id FROM entries_fts WHERE entries_fts MATCH ?1 AND entry_type = ?2",
        )?;
        let ids = stmt
            .query_map(params![expression, entry_type.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }

    fn scan(
        &self,
        entry_type: EntryType,
        needle: &str,
        fields: &[&'static str],
    ) -> Result<HashSet<String>> {
        let predicate = index_columns(fields)
            .iter()
            .map(|column| format!("v.{column} LIKE ?2 ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT e.id FROM entries e JOIN entry_versions v ON v.id = e.current_version_id \
             WHERE e.entry_type = ?1 AND ({predicate})"
        );
        let pattern = format!("%{}%", escape_like(needle));

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map(params![entry_type.as_str(), pattern], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }
}

impl RelationGraph for SqliteStore {
    fn traverse(
        &self,
        entry_id: &str,
        depth: u32,
        options: &TraverseOptions,
    ) -> Result<Vec<RelatedEdge>> {
        let depth = depth.clamp(MIN_DEPTH, MAX_DEPTH);
        let relation = options.relation.map(|r| r.as_str());
        let conn = self.lock()?;

        let mut forward = conn.prepare_cached(
            "SELECT target_type, target_id, relation_type FROM entry_relations \
             WHERE source_id = ?1 AND (?2 IS NULL OR relation_type = ?2) ORDER BY created_at, id",
        )?;
        let mut backward = conn.prepare_cached(
            "SELECT source_type, source_id, relation_type FROM entry_relations \
             WHERE target_id = ?1 AND (?2 IS NULL OR relation_type = ?2) ORDER BY created_at, id",
        )?;

        let mut visited = HashSet::from([entry_id.to_string()]);
        let mut queue = VecDeque::from([(entry_id.to_string(), 0u32)]);
        let mut edges = Vec::new();

        while let Some((node, distance)) = queue.pop_front() {
            if distance >= depth {
                continue;
            }
            let mut neighbours = Vec::new();
            if options.direction != RelationDirection::Backward {
                neighbours.extend(
                    forward
                        .query_map(params![node, relation], edge_from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?,
                );
            }
            if options.direction != RelationDirection::Forward {
                neighbours.extend(
                    backward
                        .query_map(params![node, relation], edge_from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?,
                );
            }

            for (related_type, related_id, relation_type) in neighbours {
                if !visited.insert(related_id.clone()) {
                    continue;
                }
                edges.push(RelatedEdge {
                    related_type,
                    related_id: related_id.clone(),
                    relation_type,
                    distance: distance + 1,
                });
                queue.push_back((related_id, distance + 1));
            }
        }

        tracing::debug!(entry_id, depth, reached = edges.len(), "relation traversal");
        Ok(edges)
    }
}

// ── Write path ──────────────────────────────────────────────────────

pub fn create_org(conn: &Connection, name: &str) -> anyhow::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO orgs (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![id, name, now_timestamp()],
    )?;
    Ok(id)
}

pub fn create_project(conn: &Connection, name: &str, org_id: Option<&str>) -> anyhow::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO projects (id, org_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, org_id, name, now_timestamp()],
    )?;
    Ok(id)
}

pub fn create_session(
    conn: &Connection,
    project_id: Option<&str>,
    name: Option<&str>,
) -> anyhow::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO sessions (id, project_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, project_id, name, now_timestamp()],
    )?;
    Ok(id)
}

/// Create an entry with version 1. Returns the entry id.
pub fn create_entry(
    conn: &mut Connection,
    scope: &ScopeDescriptor,
    payload: &EntryPayload,
) -> anyhow::Result<String> {
    create_entry_at(conn, scope, payload, &now_timestamp())
}

/// [`create_entry`] with an explicit creation timestamp (imports keep theirs).
pub fn create_entry_at(
    conn: &mut Connection,
    scope: &ScopeDescriptor,
    payload: &EntryPayload,
    created_at: &str,
) -> anyhow::Result<String> {
    scope.validate()?;
    anyhow::ensure!(!payload.title().trim().is_empty(), "entry name/title must not be empty");

    let id = uuid::Uuid::now_v7().to_string();
    let scope_id = match scope.scope_type {
        ScopeType::Global => None,
        _ => scope.id.as_deref(),
    };

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO entries (id, entry_type, scope_type, scope_id, is_active, created_at) \
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![
            id,
            payload.entry_type().as_str(),
            scope.scope_type.as_str(),
            scope_id,
            created_at
        ],
    )?;
    insert_version(&tx, &id, 1, payload, created_at)?;
    tx.commit()?;

    tracing::debug!(id = %id, entry_type = %payload.entry_type(), "entry created");
    Ok(id)
}

/// Append a new version and repoint the entry at it. History is never rewritten.
pub fn update_entry(
    conn: &mut Connection,
    entry_id: &str,
    payload: &EntryPayload,
) -> anyhow::Result<u32> {
    let tx = conn.transaction()?;
    let (entry_type, latest): (String, i64) = tx
        .query_row(
            "SELECT e.entry_type, COALESCE(MAX(v.version_num), 0) FROM entries e \
             LEFT JOIN entry_versions v ON v.entry_id = e.id WHERE e.id = ?1 GROUP BY e.id",
            params![entry_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .with_context(|| format!("entry not found: {entry_id}"))?;

    if entry_type != payload.entry_type().as_str() {
        bail!(
            "cannot change entry {entry_id} from {entry_type} to {}",
            payload.entry_type()
        );
    }

    let next = latest as u32 + 1;
    insert_version(&tx, entry_id, next, payload, &now_timestamp())?;
    tx.commit()?;
    Ok(next)
}

fn insert_version(
    tx: &Transaction<'_>,
    entry_id: &str,
    version_num: u32,
    payload: &EntryPayload,
    created_at: &str,
) -> anyhow::Result<()> {
    let version_id = uuid::Uuid::now_v7().to_string();
    let cols = version_columns(payload);
    tx.execute(
        "INSERT INTO entry_versions (id, entry_id, version_num, title, category, content, \
         detail, outcome, priority, confidence, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            version_id,
            entry_id,
            version_num,
            cols.title,
            cols.category,
            cols.content,
            cols.detail,
            cols.outcome,
            cols.priority,
            cols.confidence,
            created_at,
        ],
    )?;
    tx.execute(
        "UPDATE entries SET current_version_id = ?1 WHERE id = ?2",
        params![version_id, entry_id],
    )?;

    tx.execute("DELETE FROM entries_fts WHERE entry_id = ?1", params![entry_id])?;
    tx.execute(
        "INSERT INTO entries_fts (title, content, detail, entry_id, entry_type) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            cols.title,
            cols.content,
            cols.detail,
            entry_id,
            payload.entry_type().as_str()
        ],
    )?;
    Ok(())
}

pub fn set_active(conn: &Connection, entry_id: &str, active: bool) -> anyhow::Result<()> {
    let rows = conn.execute(
        "UPDATE entries SET is_active = ?1 WHERE id = ?2",
        params![active, entry_id],
    )?;
    if rows == 0 {
        bail!("entry not found: {entry_id}");
    }
    Ok(())
}

/// Attach a tag, creating it on first use. Idempotent.
pub fn add_tag(conn: &Connection, entry_id: &str, tag: &str) -> anyhow::Result<()> {
    let tag = tag.trim();
    anyhow::ensure!(!tag.is_empty(), "tag must not be empty");
    conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])?;
    conn.execute(
        "INSERT OR IGNORE INTO entry_tags (entry_id, tag_id) \
         SELECT ?1, id FROM tags WHERE name = ?2",
        params![entry_id, tag],
    )?;
    Ok(())
}

/// Record `source --relation--> target`. Returns `false` if the edge already existed.
pub fn add_relation(
    conn: &Connection,
    source_id: &str,
    target_id: &str,
    relation: RelationType,
) -> anyhow::Result<bool> {
    let entry_type = |id: &str| -> anyhow::Result<String> {
        conn.query_row(
            "SELECT entry_type FROM entries WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .with_context(|| format!("entry not found: {id}"))
    };
    let source_type = entry_type(source_id)?;
    let target_type = entry_type(target_id)?;

    let rows = conn.execute(
        "INSERT OR IGNORE INTO entry_relations \
         (id, source_type, source_id, target_type, target_id, relation_type, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            uuid::Uuid::now_v7().to_string(),
            source_type,
            source_id,
            target_type,
            target_id,
            relation.as_str(),
            now_timestamp(),
        ],
    )?;
    Ok(rows > 0)
}

pub fn link_conversation(
    conn: &Connection,
    conversation_id: &str,
    entry_id: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO conversation_entries (conversation_id, entry_id, linked_at) \
         VALUES (?1, ?2, ?3)",
        params![conversation_id, entry_id, now_timestamp()],
    )?;
    Ok(())
}

/// Stamp `last_accessed_at` on every id. Unknown ids are ignored.
pub fn record_access(conn: &mut Connection, ids: &[String]) -> anyhow::Result<usize> {
    let now = now_timestamp();
    let tx = conn.transaction()?;
    let mut touched = 0;
    {
        let mut stmt = tx.prepare_cached("UPDATE entries SET last_accessed_at = ?1 WHERE id = ?2")?;
        for id in ids {
            touched += stmt.execute(params![now, id])?;
        }
    }
    tx.commit()?;
    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn store() -> SqliteStore {
        SqliteStore::new(db::open_memory_database().unwrap())
    }

    fn tool(name: &str, description: &str) -> EntryPayload {
        EntryPayload::Tool(ToolPayload {
            name: name.into(),
            category: Some("cli".into()),
            description: description.into(),
        })
    }

    fn guideline(name: &str, content: &str, rationale: Option<&str>) -> EntryPayload {
        EntryPayload::Guideline(GuidelinePayload {
            name: name.into(),
            category: None,
            priority: 80,
            content: content.into(),
            rationale: rationale.map(String::from),
        })
    }

    fn create(store: &SqliteStore, scope: &ScopeDescriptor, payload: &EntryPayload) -> String {
        create_entry(&mut store.lock().unwrap(), scope, payload).unwrap()
    }

    #[test]
    fn create_and_read_back() {
        let store = store();
        let id = create(&store, &ScopeDescriptor::global(), &tool("cargo", "Rust build tool"));

        let entry = store.get_by_id(EntryType::Tool, &id).unwrap().unwrap();
        assert_eq!(entry.title(), "cargo");
        assert_eq!(entry.content(), "Rust build tool");
        assert_eq!(entry.current.version_num, 1);
        assert!(entry.is_active);
        assert_eq!(entry.scope_type, ScopeType::Global);

        // wrong type is not found
        assert!(store.get_by_id(EntryType::Knowledge, &id).unwrap().is_none());
    }

    #[test]
    fn updates_append_versions() {
        let store = store();
        let id = create(&store, &ScopeDescriptor::global(), &guideline("fmt", "run rustfmt", None));

        let v2 = update_entry(
            &mut store.lock().unwrap(),
            &id,
            &guideline("fmt", "run cargo fmt before commit", Some("consistency")),
        )
        .unwrap();
        assert_eq!(v2, 2);

        let history = store.get_history(EntryType::Guideline, &id).unwrap();
        let nums: Vec<u32> = history.iter().map(|v| v.version_num).collect();
        assert_eq!(nums, vec![1, 2]);
        assert_eq!(history[0].payload.content(), "run rustfmt");

        let current = store.get_by_id(EntryType::Guideline, &id).unwrap().unwrap();
        assert_eq!(current.current.version_num, 2);
        assert_eq!(current.current.payload.detail(), Some("consistency"));

        // the text index follows the current version only
        let old = store.query(EntryType::Guideline, "\"rustfmt\"", &["content"]).unwrap();
        assert!(old.is_empty());
        let new = store.query(EntryType::Guideline, "\"commit\"", &["content"]).unwrap();
        assert!(new.contains(&id));
    }

    #[test]
    fn update_cannot_change_type() {
        let store = store();
        let id = create(&store, &ScopeDescriptor::global(), &tool("make", "build"));
        let err = update_entry(&mut store.lock().unwrap(), &id, &guideline("make", "x", None));
        assert!(err.is_err());
    }

    #[test]
    fn non_global_entries_require_scope_id() {
        let store = store();
        let scope = ScopeDescriptor {
            scope_type: ScopeType::Project,
            id: None,
            inherit: false,
        };
        assert!(create_entry(&mut store.lock().unwrap(), &scope, &tool("x", "y")).is_err());
    }

    #[test]
    fn list_by_scope_is_exact_level() {
        let store = store();
        let project = ScopeDescriptor::new(ScopeType::Project, "p1");
        let g = create(&store, &ScopeDescriptor::global(), &tool("global-tool", "g"));
        let p = create(&store, &project, &tool("project-tool", "p"));
        create(&store, &ScopeDescriptor::new(ScopeType::Project, "p2"), &tool("other", "o"));

        let at_project = store.list_by_scope(EntryType::Tool, Some(&project), false).unwrap();
        assert_eq!(at_project.len(), 1);
        assert_eq!(at_project[0].id, p);

        let at_global = store
            .list_by_scope(EntryType::Tool, Some(&ScopeDescriptor::global()), false)
            .unwrap();
        assert_eq!(at_global.len(), 1);
        assert_eq!(at_global[0].id, g);

        assert_eq!(store.list_by_scope(EntryType::Tool, None, false).unwrap().len(), 3);
    }

    #[test]
    fn inactive_entries_are_hidden_unless_requested() {
        let store = store();
        let id = create(&store, &ScopeDescriptor::global(), &tool("old", "retired"));
        set_active(&store.lock().unwrap(), &id, false).unwrap();

        assert!(store.list_by_scope(EntryType::Tool, None, false).unwrap().is_empty());
        assert_eq!(store.list_by_scope(EntryType::Tool, None, true).unwrap().len(), 1);
    }

    #[test]
    fn find_by_name_matches_scope_level() {
        let store = store();
        let project = ScopeDescriptor::new(ScopeType::Project, "p1");
        let id = create(&store, &project, &tool("deploy", "ship it"));

        let hit = store.find_by_name(EntryType::Tool, "deploy", &project).unwrap();
        assert_eq!(hit.map(|e| e.id), Some(id));
        let miss = store
            .find_by_name(EntryType::Tool, "deploy", &ScopeDescriptor::global())
            .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn scope_parents_follow_hierarchy_tables() {
        let store = store();
        let (org, project, session) = {
            let conn = store.lock().unwrap();
            let org = create_org(&conn, "acme").unwrap();
            let project = create_project(&conn, "api", Some(&org)).unwrap();
            let session = create_session(&conn, Some(&project), None).unwrap();
            (org, project, session)
        };

        let parent = store
            .parent_of(&ScopeDescriptor::new(ScopeType::Session, session))
            .unwrap()
            .unwrap();
        assert_eq!(parent, ScopeDescriptor::new(ScopeType::Project, project.clone()));

        let grandparent = store.parent_of(&parent).unwrap().unwrap();
        assert_eq!(grandparent, ScopeDescriptor::new(ScopeType::Org, org));

        assert!(store.parent_of(&grandparent).unwrap().is_none());
        let orphan = ScopeDescriptor::new(ScopeType::Session, "missing");
        assert!(store.parent_of(&orphan).unwrap().is_none());
    }

    #[test]
    fn fts_query_respects_columns_and_stemming() {
        let store = store();
        let id = create(
            &store,
            &ScopeDescriptor::global(),
            &guideline("Testing", "write focused tests", Some("catches regressions")),
        );

        assert!(store
            .query(EntryType::Guideline, "\"regression\"", &["rationale"])
            .unwrap()
            .contains(&id));
        assert!(store
            .query(EntryType::Guideline, "\"regression\"", &["content"])
            .unwrap()
            .is_empty());
        // other types never match
        assert!(store
            .query(EntryType::Tool, "\"tests\"", &["name", "description"])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_fts_query_is_an_error() {
        let store = store();
        create(&store, &ScopeDescriptor::global(), &tool("x", "y"));
        assert!(store.query(EntryType::Tool, "\"unbalanced", &["name"]).is_err());
    }

    #[test]
    fn scan_treats_like_metacharacters_literally() {
        let store = store();
        let pct = create(&store, &ScopeDescriptor::global(), &tool("coverage", "reach 100% lines"));
        create(&store, &ScopeDescriptor::global(), &tool("other", "reach 1000 lines"));

        let hits = store.scan(EntryType::Tool, "100%", &["description"]).unwrap();
        assert_eq!(hits, HashSet::from([pct]));

        let underscore = store.scan(EntryType::Tool, "_", &["description"]).unwrap();
        assert!(underscore.is_empty());
        assert_eq!(escape_like(r"a\b%c_"), r"a\\b\%c\_");
    }

    #[test]
    fn traverse_walks_breadth_first_with_direction() {
        let store = store();
        let global = ScopeDescriptor::global();
        let a = create(&store, &global, &tool("a", "a"));
        let b = create(&store, &global, &tool("b", "b"));
        let c = create(&store, &global, &tool("c", "c"));
        {
            let conn = store.lock().unwrap();
            assert!(add_relation(&conn, &a, &b, RelationType::DependsOn).unwrap());
            assert!(!add_relation(&conn, &a, &b, RelationType::DependsOn).unwrap());
            add_relation(&conn, &b, &c, RelationType::RelatedTo).unwrap();
        }

        let forward = TraverseOptions {
            direction: RelationDirection::Forward,
            relation: None,
        };
        let one_hop = store.traverse(&a, 1, &forward).unwrap();
        assert_eq!(one_hop.len(), 1);
        assert_eq!(one_hop[0].related_id, b);

        let two_hops = store.traverse(&a, 2, &forward).unwrap();
        assert_eq!(two_hops.len(), 2);
        assert_eq!(two_hops[1].related_id, c);
        assert_eq!(two_hops[1].distance, 2);

        // depth 0 is clamped up to 1
        assert_eq!(store.traverse(&a, 0, &forward).unwrap().len(), 1);

        let backward = TraverseOptions {
            direction: RelationDirection::Backward,
            relation: None,
        };
        assert!(store.traverse(&a, 3, &backward).unwrap().is_empty());
        assert_eq!(store.traverse(&c, 3, &backward).unwrap().len(), 2);

        let filtered = TraverseOptions {
            direction: RelationDirection::Both,
            relation: Some(RelationType::RelatedTo),
        };
        let edges = store.traverse(&b, 3, &filtered).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].related_id, c);
    }

    #[test]
    fn tags_and_conversations() {
        let store = store();
        let id = create(&store, &ScopeDescriptor::global(), &tool("psql", "postgres shell"));
        {
            let conn = store.lock().unwrap();
            add_tag(&conn, &id, "db").unwrap();
            add_tag(&conn, &id, "DB").unwrap();
            add_tag(&conn, &id, "cli").unwrap();
            link_conversation(&conn, "conv-1", &id).unwrap();
        }

        let tags = store.tags_for(EntryType::Tool, &[id.clone()]).unwrap();
        assert_eq!(tags[&id], vec!["cli".to_string(), "db".to_string()]);

        let linked = store.conversation_entries("conv-1").unwrap();
        assert_eq!(linked, vec![(EntryType::Tool, id)]);
        assert!(store.conversation_entries("conv-2").unwrap().is_empty());
    }

    #[test]
    fn record_access_stamps_entries() {
        let store = store();
        let id = create(&store, &ScopeDescriptor::global(), &tool("x", "y"));
        let touched =
            record_access(&mut store.lock().unwrap(), &[id.clone(), "missing".into()]).unwrap();
        assert_eq!(touched, 1);
        let entry = store.get_by_id(EntryType::Tool, &id).unwrap().unwrap();
        assert!(entry.last_accessed_at.is_some());
    }
}
