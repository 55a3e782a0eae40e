use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_opt_uuid, col_ts, col_uuid, ts_to_sql};
use crate::db::DatabaseError;
use crate::models::*;

const DOCTOR_COLUMNS: &str =
    "id, user_id, first_name, last_name, phone, specialty, color, created_at";

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, user_id, first_name, last_name, phone, specialty, color, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            doctor.id.to_string(),
            doctor.user_id.map(|id| id.to_string()),
            doctor.first_name,
            doctor.last_name,
            doctor.phone,
            doctor.specialty,
            doctor.color,
            ts_to_sql(&doctor.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1");
    let doctor = conn
        .query_row(&sql, params![id.to_string()], doctor_from_row)
        .optional()?;
    Ok(doctor)
}

/// Overwrite the editable doctor columns. `color` must already be resolved.
pub fn update_doctor(
    conn: &Connection,
    id: &Uuid,
    input: &DoctorInput,
    color: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET user_id = ?2, first_name = ?3, last_name = ?4, phone = ?5,
         specialty = ?6, color = ?7
         WHERE id = ?1",
        params![
            id.to_string(),
            input.user_id.map(|id| id.to_string()),
            input.first_name,
            input.last_name,
            input.phone,
            input.specialty,
            color,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("doctor", id));
    }
    Ok(())
}

pub fn delete_doctor(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM doctors WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::not_found("doctor", id));
    }
    Ok(())
}

/// Roster ordered by first name.
pub fn list_doctors(conn: &Connection) -> Result<Vec<Doctor>, DatabaseError> {
    let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY first_name ASC, last_name ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], doctor_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: col_uuid(row, 0)?,
        user_id: col_opt_uuid(row, 1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        phone: row.get(4)?,
        specialty: row.get(5)?,
        color: row.get(6)?,
        created_at: col_ts(row, 7)?,
    })
}
