//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`]. The embedding model
//! identifier is kept alongside so a model swap can be detected at startup.

use rusqlite::Connection;

type Migration = fn(&Connection) -> rusqlite::Result<()>;

/// Migrations in order; entry `i` upgrades version `i + 1` to `i + 2`.
/// The DDL in `schema.rs` is version 1.
const MIGRATIONS: &[Migration] = &[];

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1 + MIGRATIONS.len() as u32;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Update the stored schema version.
fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, migrations: &[Migration]) -> rusqlite::Result<()> {
    let target = 1 + migrations.len() as u32;
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target, "checking migrations");

    if version > target {
        tracing::warn!(
            schema_version = version,
            supported = target,
            "database was written by a newer memex; leaving schema untouched"
        );
        return Ok(());
    }

    while version < target {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let Some(migrate) = version
            .checked_sub(1)
            .and_then(|i| migrations.get(i as usize))
        else {
            tracing::error!(version, "no migration from this version");
            break;
        };

        let tx = conn.unchecked_transaction()?;
        migrate(&tx)?;
        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}
