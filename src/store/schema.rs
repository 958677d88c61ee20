//! SQLite DDL definitions for the alfred task store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Pragmas for the writer connection.
///
/// WAL lets readers proceed while a writer holds its transaction. The
/// journal mode is stored in the database file, so the read-only
/// connections inherit it and only set their own `busy_timeout`.
pub(crate) const CONNECTION_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
"#;

/// Complete DDL for the task database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Recurring task definitions. Only is_active changes after insert.
CREATE TABLE IF NOT EXISTS todo_templates (
    template_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL,
    content     TEXT    NOT NULL,
    cron        TEXT    NOT NULL,
    ddl_offset  TEXT    NOT NULL,
    run_once    INTEGER NOT NULL DEFAULT 0,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_templates_user_active ON todo_templates(user_id, is_active);

-- One row per materialized occurrence.
CREATE TABLE IF NOT EXISTS todos (
    todo_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES todo_templates(template_id),
    user_id     TEXT    NOT NULL,
    status      TEXT    NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'completed', 'escalated', 'revoked')),
    remind_at   TEXT    NOT NULL,
    deadline    TEXT    NOT NULL,
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL,
    CHECK (deadline >= remind_at)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_todos_occurrence ON todos(user_id, template_id, remind_at);
CREATE INDEX IF NOT EXISTS idx_todos_user_status ON todos(user_id, status);
CREATE INDEX IF NOT EXISTS idx_todos_status_deadline ON todos(status, deadline);
CREATE INDEX IF NOT EXISTS idx_todos_template ON todos(template_id);

-- Append-only audit trail.
CREATE TABLE IF NOT EXISTS todo_status_logs (
    log_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    todo_id    INTEGER NOT NULL REFERENCES todos(todo_id),
    old_status TEXT,
    new_status TEXT NOT NULL,
    changed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_todo_id ON todo_status_logs(todo_id);
"#;

/// Tables in dependency order, used by the debug dump.
pub(crate) const TABLES: &[&str] = &["todo_templates", "todos", "todo_status_logs"];

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times. Seeds the schema version into
/// `schema_meta` on a fresh database.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version_str = super::types::CURRENT_SCHEMA_VERSION.to_string();
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;

    Ok(())
}

/// Read the current schema version from the database.
///
/// Returns `None` if the `schema_meta` table is empty or the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
