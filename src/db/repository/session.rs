use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{col_uuid, ts_to_sql};
use crate::db::DatabaseError;

pub fn insert_session(
    conn: &Connection,
    token_hash: &[u8; 32],
    user_id: &Uuid,
    created_at: &DateTime<Utc>,
    expires_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO auth_sessions (token_hash, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            &token_hash[..],
            user_id.to_string(),
            ts_to_sql(created_at),
            ts_to_sql(expires_at),
        ],
    )?;
    Ok(())
}

/// User owning an unexpired session with this token hash.
pub fn find_session_user(
    conn: &Connection,
    token_hash: &[u8; 32],
    now: &DateTime<Utc>,
) -> Result<Option<Uuid>, DatabaseError> {
    let user = conn
        .query_row(
            "SELECT user_id FROM auth_sessions WHERE token_hash = ?1 AND expires_at > ?2",
            params![&token_hash[..], ts_to_sql(now)],
            |row| col_uuid(row, 0),
        )
        .optional()?;
    Ok(user)
}

/// Returns `true` if a session was removed.
pub fn delete_session(conn: &Connection, token_hash: &[u8; 32]) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM auth_sessions WHERE token_hash = ?1",
        params![&token_hash[..]],
    )?;
    Ok(changed > 0)
}

pub fn delete_user_sessions(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM auth_sessions WHERE user_id = ?1",
        params![user_id.to_string()],
    )?;
    Ok(changed)
}

pub fn purge_expired_sessions(conn: &Connection, now: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM auth_sessions WHERE expires_at <= ?1",
        params![ts_to_sql(now)],
    )?;
    Ok(changed)
}

pub fn insert_password_reset(
    conn: &Connection,
    token_hash: &[u8; 32],
    user_id: &Uuid,
    expires_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![&token_hash[..], user_id.to_string(), ts_to_sql(expires_at)],
    )?;
    Ok(())
}

/// Mark a reset token used and return its user. Expired or used tokens yield `None`.
pub fn consume_password_reset(
    conn: &Connection,
    token_hash: &[u8; 32],
    now: &DateTime<Utc>,
) -> Result<Option<Uuid>, DatabaseError> {
    let user = conn
        .query_row(
            "UPDATE password_resets SET used = 1
             WHERE token_hash = ?1 AND used = 0 AND expires_at > ?2
             RETURNING user_id",
            params![&token_hash[..], ts_to_sql(now)],
            |row| col_uuid(row, 0),
        )
        .optional()?;
    Ok(user)
}
