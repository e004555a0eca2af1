mod helpers;

use helpers::{insert, knowledge, test_store};
use memex::db;
use memex::memory::store;
use memex::memory::types::ScopeDescriptor;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("memory.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn reopening_keeps_data() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("memory.db");

    {
        let mut conn = db::open_database(&db_path).unwrap();
        store::create_entry(&mut conn, &ScopeDescriptor::global(), &knowledge("kept", "survives reopen"))
            .unwrap();
    }

    let conn = db::open_database(&db_path).unwrap();
    let report = db::check_database_health(&conn).unwrap();
    assert_eq!(report.entry_count, 1);
    assert_eq!(report.version_count, 1);
}

#[test]
fn health_check_counts_rows() {
    let store = test_store();
    let a = insert(&store, &ScopeDescriptor::global(), knowledge("a", "first"));
    let b = insert(&store, &ScopeDescriptor::global(), knowledge("b", "second"));

    let conn = store.lock().unwrap();
    store::add_tag(&conn, &a, "rust").unwrap();
    store::set_active(&conn, &b, false).unwrap();

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(report.entry_count, 2);
    assert_eq!(report.active_entry_count, 1);
    assert_eq!(report.tag_count, 1);
    assert_eq!(report.relation_count, 0);
    assert_eq!(report.unindexed_count, 0);
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}
