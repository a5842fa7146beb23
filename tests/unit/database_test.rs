//! Unit tests for the SmartMarks database layer (connection + migrations).

use smartmarks::database::migrations::{self, CURRENT_SCHEMA_VERSION};
use smartmarks::database::Database;
use tempfile::TempDir;

fn table_exists(db: &Database, name: &str) -> bool {
    db.connection()
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )
        .unwrap_or(false)
}

#[test]
fn test_migrations_create_all_tables() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    for table in ["schema_version", "users", "bookmarks", "local_session"] {
        assert!(table_exists(&db, table), "Table '{}' should exist after migrations", table);
    }
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(migrations::get_schema_version(&db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    migrations::run_all(&conn).expect("second run should succeed");

    let applied: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(applied, CURRENT_SCHEMA_VERSION as i64);
}

#[test]
fn test_empty_title_is_rejected_by_schema() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    conn.execute(
        "INSERT INTO users (id, provider, created_at) VALUES ('u', 'google', 0)",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO bookmarks (id, user_id, title, url, created_at) VALUES ('b', 'u', '', 'https://x.example/', 0)",
        [],
    );
    assert!(result.is_err(), "empty title must violate the CHECK constraint");
}

#[test]
fn test_bookmark_requires_known_user() {
    let db = Database::open_in_memory().unwrap();
    let result = db.connection().execute(
        "INSERT INTO bookmarks (id, user_id, title, url, created_at) VALUES ('b', 'ghost', 'T', 'https://x.example/', 0)",
        [],
    );
    assert!(result.is_err(), "foreign keys should be enforced");
}

/// A file database keeps its rows across reopen.
#[test]
fn test_file_database_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("marks.db");

    {
        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO users (id, provider, created_at) VALUES ('u', 'google', 0)",
                [],
            )
            .unwrap();
    }

    let db = Database::open(&path).unwrap();
    let users: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 1);
    assert_eq!(migrations::get_schema_version(&db.connection()), CURRENT_SCHEMA_VERSION);
}
