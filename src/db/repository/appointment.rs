use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_enum, col_opt_ts, col_opt_uuid, col_ts, col_uuid, ts_to_sql};
use crate::db::DatabaseError;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "a.id, a.patient_id, a.doctor_id, a.service_id, a.appointment_date,
     a.duration_minutes, a.status, a.notes, a.created_by, a.created_at, a.updated_at";

const DETAIL_JOINS: &str = "FROM appointments a
     JOIN patients p ON p.id = a.patient_id
     JOIN doctors d ON d.id = a.doctor_id
     LEFT JOIN services s ON s.id = a.service_id";

const DETAIL_EXTRA_COLUMNS: &str =
    "p.first_name, p.last_name, d.first_name, d.last_name, d.specialty, d.color, s.name, s.price";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, service_id, appointment_date,
         duration_minutes, status, notes, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.service_id.map(|id| id.to_string()),
            ts_to_sql(&appt.appointment_date),
            appt.duration_minutes,
            appt.status.as_str(),
            appt.notes,
            appt.created_by.map(|id| id.to_string()),
            ts_to_sql(&appt.created_at),
            appt.updated_at.as_ref().map(ts_to_sql),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?1");
    let appt = conn
        .query_row(&sql, params![id.to_string()], appointment_from_row)
        .optional()?;
    Ok(appt)
}

/// Overwrite every editable column of an existing appointment.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET patient_id = ?2, doctor_id = ?3, service_id = ?4,
         appointment_date = ?5, duration_minutes = ?6, status = ?7, notes = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.service_id.map(|id| id.to_string()),
            ts_to_sql(&appt.appointment_date),
            appt.duration_minutes,
            appt.status.as_str(),
            appt.notes,
            appt.updated_at.as_ref().map(ts_to_sql),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("appointment", appt.id));
    }
    Ok(())
}

pub fn get_appointment_detail(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<AppointmentDetail>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS}, {DETAIL_EXTRA_COLUMNS} {DETAIL_JOINS} WHERE a.id = ?1"
    );
    let detail = conn
        .query_row(&sql, params![id.to_string()], detail_from_row)
        .optional()?;
    Ok(detail)
}

/// Every appointment with its patient, doctor and service, latest first.
pub fn list_appointment_details(conn: &Connection) -> Result<Vec<AppointmentDetail>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS}, {DETAIL_EXTRA_COLUMNS} {DETAIL_JOINS}
         ORDER BY a.appointment_date DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], detail_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Appointments starting in `[start, end)`, earliest first.
pub fn list_appointment_details_between(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<AppointmentDetail>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS}, {DETAIL_EXTRA_COLUMNS} {DETAIL_JOINS}
         WHERE a.appointment_date >= ?1 AND a.appointment_date < ?2
         ORDER BY a.appointment_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![ts_to_sql(start), ts_to_sql(end)], detail_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// A patient's appointments, latest first.
pub fn list_patient_appointments(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<AppointmentDetail>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS}, {DETAIL_EXTRA_COLUMNS} {DETAIL_JOINS}
         WHERE a.patient_id = ?1
         ORDER BY a.appointment_date DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id.to_string()], detail_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Bookings that can collide with a new slot for `doctor_id`.
///
/// Cancelled and no-show appointments are skipped. When `service_id` is given
/// only bookings for that service are returned; `exclude` drops the
/// appointment being edited.
pub fn list_booked_slots(
    conn: &Connection,
    doctor_id: &Uuid,
    service_id: Option<&Uuid>,
    exclude: Option<&Uuid>,
) -> Result<Vec<BookedSlot>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_date, duration_minutes FROM appointments
         WHERE doctor_id = ?1
           AND status NOT IN ('cancelled', 'no_show')
           AND (?2 IS NULL OR service_id = ?2)
           AND (?3 IS NULL OR id != ?3)
         ORDER BY appointment_date ASC",
    )?;
    let rows = stmt.query_map(
        params![
            doctor_id.to_string(),
            service_id.map(|id| id.to_string()),
            exclude.map(|id| id.to_string()),
        ],
        |row| {
            Ok(BookedSlot {
                id: col_uuid(row, 0)?,
                appointment_date: col_ts(row, 1)?,
                duration_minutes: row.get(2)?,
            })
        },
    )?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: col_uuid(row, 0)?,
        patient_id: col_uuid(row, 1)?,
        doctor_id: col_uuid(row, 2)?,
        service_id: col_opt_uuid(row, 3)?,
        appointment_date: col_ts(row, 4)?,
        duration_minutes: row.get(5)?,
        status: col_enum(row, 6)?,
        notes: row.get(7)?,
        created_by: col_opt_uuid(row, 8)?,
        created_at: col_ts(row, 9)?,
        updated_at: col_opt_ts(row, 10)?,
    })
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<AppointmentDetail> {
    let appointment = appointment_from_row(row)?;
    let service = match (appointment.service_id, row.get::<_, Option<String>>(17)?) {
        (Some(id), Some(name)) => Some(ServiceSummary {
            id,
            name,
            price: row.get(18)?,
        }),
        _ => None,
    };
    Ok(AppointmentDetail {
        patient: PersonName {
            first_name: row.get(11)?,
            last_name: row.get(12)?,
        },
        doctor: DoctorSummary {
            id: appointment.doctor_id,
            first_name: row.get(13)?,
            last_name: row.get(14)?,
            specialty: row.get(15)?,
            color: row.get(16)?,
        },
        service,
        appointment,
    })
}
