//! Connection setup and schema upgrades for the clinic database.
//!
//! Every connection gets the same pragmas, then any schema step newer than
//! the recorded version is applied in its own transaction together with its
//! `schema_version` row.

use std::path::Path;

use rusqlite::{params, Connection};

use super::DatabaseError;

struct SchemaStep {
    version: i64,
    label: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    label: "initial clinic schema",
    sql: include_str!("../../resources/migrations/001_initial.sql"),
}];

const CONNECTION_PRAGMAS: &str = "
    PRAGMA busy_timeout = 5000;
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
";

/// Open (creating if needed) the clinic database at `path`, upgraded to the
/// latest schema.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    prepare(Connection::open(path)?)
}

/// Throwaway database for tests and tooling.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(mut conn: Connection) -> Result<Connection, DatabaseError> {
    // busy_timeout queues writers behind a booking's IMMEDIATE transaction.
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

/// Apply pending schema steps. Returns how many ran.
pub fn run_migrations(conn: &mut Connection) -> Result<usize, DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;
    let current = schema_version(conn)?;

    let mut applied = 0;
    for step in SCHEMA_STEPS.iter().filter(|s| s.version > current) {
        let failed = |e: rusqlite::Error| DatabaseError::MigrationFailed {
            version: step.version,
            reason: e.to_string(),
        };
        let tx = conn.transaction().map_err(failed)?;
        tx.execute_batch(step.sql).map_err(failed)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", params![step.version])
            .map_err(failed)?;
        tx.commit().map_err(failed)?;

        tracing::info!(version = step.version, label = step.label, "Schema upgraded");
        applied += 1;
    }
    Ok(applied)
}

/// Highest applied schema version, 0 on a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// User tables, `schema_version` included.
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?)
}
