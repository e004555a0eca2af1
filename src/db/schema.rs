//! SQL DDL for all memex tables.
//!
//! Defines the scope hierarchy (`orgs`, `projects`, `sessions`), versioned
//! entries (`entries`, `entry_versions`), the `entries_fts` FTS5 index,
//! `tags`/`entry_tags`, `entry_relations`, `conversation_entries`, and
//! `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Scope hierarchy
CREATE TABLE IF NOT EXISTS orgs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    org_id TEXT REFERENCES orgs(id) ON DELETE SET NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_id TEXT REFERENCES projects(id) ON DELETE SET NULL,
    name TEXT,
    created_at TEXT NOT NULL
);

-- Entry identity; content lives in entry_versions
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    entry_type TEXT NOT NULL CHECK(entry_type IN ('guideline','knowledge','tool','experience')),
    scope_type TEXT NOT NULL CHECK(scope_type IN ('global','org','project','session')),
    scope_id TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    current_version_id TEXT,
    created_at TEXT NOT NULL,
    last_accessed_at TEXT,
    CHECK((scope_type = 'global') = (scope_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_entries_type_scope ON entries(entry_type, scope_type, scope_id);
CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(created_at, id);
CREATE INDEX IF NOT EXISTS idx_entries_accessed ON entries(last_accessed_at);

-- Append-only history. title holds name|title, content holds content|description,
-- detail holds rationale|source|scenario.
CREATE TABLE IF NOT EXISTS entry_versions (
    id TEXT PRIMARY KEY,
    entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    version_num INTEGER NOT NULL CHECK(version_num >= 1),
    title TEXT NOT NULL,
    category TEXT,
    content TEXT NOT NULL,
    detail TEXT,
    outcome TEXT,
    priority INTEGER,
    confidence REAL,
    created_at TEXT NOT NULL,
    UNIQUE(entry_id, version_num)
);

-- Stemmed text index over the current version of each entry
CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
    title,
    content,
    detail,
    entry_id UNINDEXED,
    entry_type UNINDEXED,
    tokenize='porter unicode61'
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS entry_tags (
    entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY(entry_id, tag_id)
);

CREATE TABLE IF NOT EXISTS entry_relations (
    id TEXT PRIMARY KEY,
    source_type TEXT NOT NULL,
    source_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    relation_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(source_id, target_id, relation_type)
);

CREATE INDEX IF NOT EXISTS idx_relations_source ON entry_relations(source_id);
CREATE INDEX IF NOT EXISTS idx_relations_target ON entry_relations(target_id);

CREATE TABLE IF NOT EXISTS conversation_entries (
    conversation_id TEXT NOT NULL,
    entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    linked_at TEXT NOT NULL,
    PRIMARY KEY(conversation_id, entry_id)
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "orgs",
            "projects",
            "sessions",
            "entries",
            "entry_versions",
            "entries_fts",
            "tags",
            "entry_tags",
            "entry_relations",
            "conversation_entries",
            "schema_meta",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn global_entries_cannot_carry_scope_id() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let err = conn.execute(
            "INSERT INTO entries (id, entry_type, scope_type, scope_id, created_at) \
             VALUES ('e1', 'tool', 'global', 'p1', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn fts_stems_terms() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO entries_fts (title, content, detail, entry_id, entry_type) \
             VALUES ('Deploying services', 'rolling restarts', NULL, 'e1', 'tool')",
            [],
        )
        .unwrap();
        let id: String = conn
            .query_row(
                "SELECT entry_id FROM entries_fts WHERE entries_fts MATCH 'deploy'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(id, "e1");
    }
}
