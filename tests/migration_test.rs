mod helpers;

use memex::db;
use memex::db::migrations::{
    get_embedding_model, get_schema_version, run_migrations, set_embedding_model,
    CURRENT_SCHEMA_VERSION,
};
use tempfile::TempDir;

#[test]
fn fresh_db_migrates_to_current_version() {
    let conn = helpers::test_db();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn embedding_model_is_recorded_explicitly() {
    let conn = helpers::test_db();
    assert!(get_embedding_model(&conn).unwrap().is_none());

    set_embedding_model(&conn, "all-MiniLM-L6-v2").unwrap();
    assert_eq!(
        get_embedding_model(&conn).unwrap().as_deref(),
        Some("all-MiniLM-L6-v2")
    );
}

#[test]
fn migrations_are_idempotent() {
    let conn = helpers::test_db();
    run_migrations(&conn).unwrap();
    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn reopening_keeps_schema_meta() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memory.db");
    {
        let conn = db::open_database(&path).unwrap();
        set_embedding_model(&conn, "bge-small-en-v1.5").unwrap();
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(
        get_embedding_model(&conn).unwrap().as_deref(),
        Some("bge-small-en-v1.5")
    );
}
