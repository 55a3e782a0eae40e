use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_opt_date, col_opt_ts, col_opt_uuid, col_ts, col_uuid, ts_to_sql};
use crate::db::DatabaseError;
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, first_name, last_name, email, phone, date_of_birth, address,
     emergency_contact_name, emergency_contact_phone, medical_notes,
     created_by, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, first_name, last_name, email, phone, date_of_birth, address,
         emergency_contact_name, emergency_contact_phone, medical_notes,
         created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            patient.id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.email,
            patient.phone,
            patient.date_of_birth.map(|d| d.to_string()),
            patient.address,
            patient.emergency_contact_name,
            patient.emergency_contact_phone,
            patient.medical_notes,
            patient.created_by.map(|id| id.to_string()),
            ts_to_sql(&patient.created_at),
            patient.updated_at.as_ref().map(ts_to_sql),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
    let patient = conn
        .query_row(&sql, params![id.to_string()], patient_from_row)
        .optional()?;
    Ok(patient)
}

pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    input: &PatientInput,
    updated_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET first_name = ?2, last_name = ?3, email = ?4, phone = ?5,
         date_of_birth = ?6, address = ?7, emergency_contact_name = ?8,
         emergency_contact_phone = ?9, medical_notes = ?10, updated_at = ?11
         WHERE id = ?1",
        params![
            id.to_string(),
            input.first_name,
            input.last_name,
            input.email,
            input.phone,
            input.date_of_birth.map(|d| d.to_string()),
            input.address,
            input.emergency_contact_name,
            input.emergency_contact_phone,
            input.medical_notes,
            ts_to_sql(&updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("patient", id));
    }
    Ok(())
}

/// All patients, newest first.
pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC, rowid DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], patient_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: col_uuid(row, 0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        date_of_birth: col_opt_date(row, 5)?,
        address: row.get(6)?,
        emergency_contact_name: row.get(7)?,
        emergency_contact_phone: row.get(8)?,
        medical_notes: row.get(9)?,
        created_by: col_opt_uuid(row, 10)?,
        created_at: col_ts(row, 11)?,
        updated_at: col_opt_ts(row, 12)?,
    })
}
