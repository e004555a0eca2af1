//! SQLite connection setup, schema, migrations, and health checks.

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Open (or create) the memex database at the given path with schema and
/// migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL for concurrent readers
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a migrated in-memory database.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Output of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub embedding_model: Option<String>,
    pub entry_count: u64,
    pub active_entry_count: u64,
    pub version_count: u64,
    pub relation_count: u64,
    pub tag_count: u64,
    /// Current versions missing from the text index.
    pub unindexed_count: u64,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<u64> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
}

/// Run `PRAGMA integrity_check` and gather row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;

    Ok(HealthReport {
        schema_version: migrations::get_schema_version(conn)?,
        embedding_model: migrations::get_embedding_model(conn)?,
        entry_count: count(conn, "SELECT COUNT(*) FROM entries")?,
        active_entry_count: count(conn, "SELECT COUNT(*) FROM entries WHERE is_active = 1")?,
        version_count: count(conn, "SELECT COUNT(*) FROM entry_versions")?,
        relation_count: count(conn, "SELECT COUNT(*) FROM entry_relations")?,
        tag_count: count(conn, "SELECT COUNT(*) FROM tags")?,
        unindexed_count: count(
            conn,
            "SELECT COUNT(*) FROM entries WHERE id NOT IN (SELECT entry_id FROM entries_fts)",
        )?,
        integrity_ok: integrity_details == "ok",
        integrity_details,
    })
}
