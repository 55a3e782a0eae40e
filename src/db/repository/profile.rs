use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_enum, col_ts, col_uuid, ts_to_sql};
use crate::db::DatabaseError;
use crate::models::*;

const PROFILE_COLUMNS: &str = "id, email, first_name, last_name, role, created_at";

/// Stored password material for an account.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user_id: Uuid,
    pub password_hash: Vec<u8>,
    pub salt: Vec<u8>,
}

pub fn insert_profile(conn: &Connection, profile: &Profile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO profiles (id, email, first_name, last_name, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            profile.id.to_string(),
            profile.email,
            profile.first_name,
            profile.last_name,
            profile.role.as_str(),
            ts_to_sql(&profile.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &Uuid) -> Result<Option<Profile>, DatabaseError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1");
    let profile = conn
        .query_row(&sql, params![id.to_string()], profile_from_row)
        .optional()?;
    Ok(profile)
}

/// Case-insensitive lookup (the column is `COLLATE NOCASE`).
pub fn find_profile_by_email(conn: &Connection, email: &str) -> Result<Option<Profile>, DatabaseError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ?1");
    let profile = conn
        .query_row(&sql, params![email.trim()], profile_from_row)
        .optional()?;
    Ok(profile)
}

pub fn list_profiles(conn: &Connection) -> Result<Vec<Profile>, DatabaseError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY first_name ASC, last_name ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], profile_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn count_profiles(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
    Ok(count)
}

pub fn update_profile_role(conn: &Connection, id: &Uuid, role: Role) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE profiles SET role = ?2 WHERE id = ?1",
        params![id.to_string(), role.as_str()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("profile", id));
    }
    Ok(())
}

pub fn insert_account(
    conn: &Connection,
    user_id: &Uuid,
    password_hash: &[u8],
    salt: &[u8],
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (user_id, password_hash, salt, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id.to_string(), password_hash, salt, ts_to_sql(now)],
    )?;
    Ok(())
}

pub fn get_credentials_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<StoredCredentials>, DatabaseError> {
    let creds = conn
        .query_row(
            "SELECT a.user_id, a.password_hash, a.salt
             FROM accounts a JOIN profiles p ON p.id = a.user_id
             WHERE p.email = ?1",
            params![email.trim()],
            |row| {
                Ok(StoredCredentials {
                    user_id: col_uuid(row, 0)?,
                    password_hash: row.get(1)?,
                    salt: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(creds)
}

pub fn update_password(
    conn: &Connection,
    user_id: &Uuid,
    password_hash: &[u8],
    salt: &[u8],
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE accounts SET password_hash = ?2, salt = ?3, updated_at = ?4 WHERE user_id = ?1",
        params![user_id.to_string(), password_hash, salt, ts_to_sql(now)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("account", user_id));
    }
    Ok(())
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: col_uuid(row, 0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        role: col_enum(row, 4)?,
        created_at: col_ts(row, 5)?,
    })
}
