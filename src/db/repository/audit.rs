use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::ts_to_sql;
use crate::db::DatabaseError;

/// Row shape of `audit_log`: (timestamp, user_id, action, entity).
pub type AuditRow = (String, Option<String>, String, String);

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditRow]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, user_id, action, entity) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (timestamp, user_id, action, entity) in entries {
        stmt.execute(params![timestamp, user_id, action, entity])?;
    }
    Ok(())
}

/// Prune audit entries older than `cutoff`.
pub fn prune_audit_log(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![ts_to_sql(cutoff)],
    )?;
    Ok(deleted)
}

/// Most recent audit entries, newest first.
pub fn recent_audit_entries(conn: &Connection, limit: usize) -> Result<Vec<AuditRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, user_id, action, entity FROM audit_log
         ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
