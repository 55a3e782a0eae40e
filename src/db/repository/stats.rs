use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::ts_to_sql;
use crate::db::DatabaseError;

pub fn count_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?)
}

pub fn count_appointments(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))?)
}

pub fn count_services(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?)
}

/// Appointments starting in `[start, end)`.
pub fn count_appointments_between(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE appointment_date >= ?1 AND appointment_date < ?2",
        params![ts_to_sql(start), ts_to_sql(end)],
        |row| row.get(0),
    )?)
}
