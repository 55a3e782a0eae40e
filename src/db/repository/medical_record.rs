use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_opt_uuid, col_ts, col_uuid, ts_to_sql};
use crate::db::DatabaseError;
use crate::models::*;

const RECORD_COLUMNS: &str = "r.id, r.patient_id, r.doctor_id, r.appointment_id, r.diagnosis,
     r.treatment, r.medications, r.notes, r.record_date, r.created_by, r.created_at";

const DETAIL_SELECT: &str = "p.first_name, p.last_name, d.first_name, d.last_name, d.specialty, d.color
     FROM medical_records r
     JOIN patients p ON p.id = r.patient_id
     JOIN doctors d ON d.id = r.doctor_id";

pub fn insert_medical_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (id, patient_id, doctor_id, appointment_id, diagnosis,
         treatment, medications, notes, record_date, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.doctor_id.to_string(),
            record.appointment_id.map(|id| id.to_string()),
            record.diagnosis,
            record.treatment,
            record.medications,
            record.notes,
            ts_to_sql(&record.record_date),
            record.created_by.map(|id| id.to_string()),
            ts_to_sql(&record.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_medical_record(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<MedicalRecord>, DatabaseError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM medical_records r WHERE r.id = ?1");
    let record = conn
        .query_row(&sql, params![id.to_string()], record_from_row)
        .optional()?;
    Ok(record)
}

pub fn update_medical_record(
    conn: &Connection,
    id: &Uuid,
    input: &MedicalRecordInput,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medical_records SET patient_id = ?2, doctor_id = ?3, appointment_id = ?4,
         diagnosis = ?5, treatment = ?6, medications = ?7, notes = ?8, record_date = ?9
         WHERE id = ?1",
        params![
            id.to_string(),
            input.patient_id.to_string(),
            input.doctor_id.to_string(),
            input.appointment_id.map(|id| id.to_string()),
            input.diagnosis,
            input.treatment,
            input.medications,
            input.notes,
            ts_to_sql(&input.record_date),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("medical_record", id));
    }
    Ok(())
}

/// All records with patient and doctor names, most recent record date first.
pub fn list_medical_record_details(
    conn: &Connection,
) -> Result<Vec<MedicalRecordDetail>, DatabaseError> {
    let sql = format!("SELECT {RECORD_COLUMNS}, {DETAIL_SELECT} ORDER BY r.record_date DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], detail_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn list_patient_medical_records(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalRecordDetail>, DatabaseError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS}, {DETAIL_SELECT}
         WHERE r.patient_id = ?1
         ORDER BY r.record_date DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id.to_string()], detail_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    Ok(MedicalRecord {
        id: col_uuid(row, 0)?,
        patient_id: col_uuid(row, 1)?,
        doctor_id: col_uuid(row, 2)?,
        appointment_id: col_opt_uuid(row, 3)?,
        diagnosis: row.get(4)?,
        treatment: row.get(5)?,
        medications: row.get(6)?,
        notes: row.get(7)?,
        record_date: col_ts(row, 8)?,
        created_by: col_opt_uuid(row, 9)?,
        created_at: col_ts(row, 10)?,
    })
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecordDetail> {
    let record = record_from_row(row)?;
    Ok(MedicalRecordDetail {
        patient: PersonName {
            first_name: row.get(11)?,
            last_name: row.get(12)?,
        },
        doctor: DoctorSummary {
            id: record.doctor_id,
            first_name: row.get(13)?,
            last_name: row.get(14)?,
            specialty: row.get(15)?,
            color: row.get(16)?,
        },
        record,
    })
}
