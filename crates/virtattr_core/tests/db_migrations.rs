use rusqlite::{params, Connection};
use virtattr_core::db::migrations::latest_version;
use virtattr_core::db::{open_db, open_db_in_memory, DbError};
use virtattr_core::{RepoError, SchemaRegistry, SqliteRecordRepository};

#[test]
fn field_rows_require_a_record_and_cascade_with_it() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());

    let orphan = conn.execute(
        "INSERT INTO record_fields (record_uuid, field, payload) VALUES ('missing', 'data', '{}');",
        [],
    );
    assert!(orphan.is_err(), "field rows must reference a stored record");

    conn.execute(
        "INSERT INTO records (uuid, model, base_model) VALUES (?1, 'SubThing', 'Thing');",
        params!["r1"],
    )
    .unwrap();
    for field in ["data", "meta_data"] {
        conn.execute(
            "INSERT INTO record_fields (record_uuid, field) VALUES ('r1', ?1);",
            [field],
        )
        .unwrap();
    }
    let columns: String = conn
        .query_row("SELECT columns FROM records WHERE uuid = 'r1';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(columns, "{}");

    conn.execute("DELETE FROM records WHERE uuid = 'r1';", [])
        .unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM record_fields;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn database_from_a_newer_release_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("PRAGMA user_version = 999;")
        .unwrap();

    assert!(matches!(
        open_db(&path).unwrap_err(),
        DbError::UnsupportedSchemaVersion { db_version: 999, .. }
    ));
}

#[test]
fn repository_requires_migrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteRecordRepository::try_new(&conn, SchemaRegistry::new())
        .err()
        .expect("unmigrated connection should be rejected");
    assert!(matches!(err, RepoError::MissingRequiredTable("records")));
}
