//! Appointment booking with doctor double-booking protection.
//!
//! An appointment occupies the half-open interval `[start, start + duration)`.
//! A booking is rejected when it overlaps another appointment of the same
//! doctor (and the same service, when one is chosen) that still blocks the
//! schedule. The read and the write share one `IMMEDIATE` transaction.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc};
use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::{is_supported_year, MAX_YEAR, MIN_YEAR};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{
    Appointment, AppointmentInput, BookedSlot, Doctor, Service, DEFAULT_APPOINTMENT_MINUTES,
};

pub const MIN_DURATION_MINUTES: u32 = 15;
pub const MAX_DURATION_MINUTES: u32 = 240;
pub const DURATION_STEP_MINUTES: u32 = 15;

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("{message}")]
    Conflict { message: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(err))
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// The end saturates at the latest representable instant.
    pub fn new(start: DateTime<Utc>, duration_minutes: u32) -> Self {
        let end = start
            .checked_add_signed(Duration::minutes(i64::from(duration_minutes)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    /// Touching intervals (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl From<&BookedSlot> for Interval {
    fn from(slot: &BookedSlot) -> Self {
        Interval::new(slot.appointment_date, slot.duration_minutes)
    }
}

/// First existing slot overlapping `candidate`, in iteration order.
pub fn find_conflict<'a>(candidate: &Interval, existing: &'a [BookedSlot]) -> Option<&'a BookedSlot> {
    existing
        .iter()
        .find(|slot| candidate.overlaps(&Interval::from(*slot)))
}

/// Explicit duration, else the service's, else the clinic default.
pub fn resolve_duration(input: &AppointmentInput, service: Option<&Service>) -> u32 {
    input
        .duration_minutes
        .or_else(|| service.map(|s| s.duration_minutes))
        .unwrap_or(DEFAULT_APPOINTMENT_MINUTES)
}

pub fn validate_duration(minutes: u32) -> Result<(), SchedulingError> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes)
        || minutes % DURATION_STEP_MINUTES != 0
    {
        return Err(SchedulingError::Validation(format!(
            "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes in steps of {DURATION_STEP_MINUTES}"
        )));
    }
    Ok(())
}

/// Validate a booking request and return the effective duration.
pub fn validate_appointment(input: &AppointmentInput, service: Option<&Service>) -> Result<u32, SchedulingError> {
    if !is_supported_year(input.appointment_date.year()) {
        return Err(SchedulingError::Validation(format!(
            "Appointment date must fall between years {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    let minutes = resolve_duration(input, service);
    validate_duration(minutes)?;
    Ok(minutes)
}

/// User-facing rejection, rendered in clinic wall-clock time.
pub fn conflict_message(
    doctor: &Doctor,
    service: Option<&Service>,
    start: DateTime<Utc>,
    offset: &FixedOffset,
) -> String {
    let local = start.with_timezone(offset);
    let service_part = service
        .map(|s| format!(" for the {} service", s.name))
        .unwrap_or_default();
    format!(
        "Dr. {} {} already has an appointment on {} at {}{}. Please choose another time.",
        doctor.first_name,
        doctor.last_name,
        local.format("%B %-d, %Y"),
        local.format("%H:%M"),
        service_part,
    )
}

pub fn book_appointment(
    conn: &mut Connection,
    input: &AppointmentInput,
    created_by: Option<Uuid>,
    offset: &FixedOffset,
    now: DateTime<Utc>,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let (doctor, service, minutes) = check_slot(&tx, input, None, offset)?;

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        doctor_id: doctor.id,
        service_id: service.map(|s| s.id),
        appointment_date: input.appointment_date,
        duration_minutes: minutes,
        status: input.status,
        notes: input.notes.clone(),
        created_by,
        created_at: now,
        updated_at: None,
    };
    repository::insert_appointment(&tx, &appointment)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        "Appointment booked"
    );
    Ok(appointment)
}

/// Apply `input` to an existing appointment, excluding it from the conflict scan.
pub fn reschedule_appointment(
    conn: &mut Connection,
    id: &Uuid,
    input: &AppointmentInput,
    offset: &FixedOffset,
    now: DateTime<Utc>,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut appointment = repository::get_appointment(&tx, id)?
        .ok_or_else(|| DatabaseError::not_found("appointment", id))?;
    let (doctor, service, minutes) = check_slot(&tx, input, Some(id), offset)?;

    appointment.patient_id = input.patient_id;
    appointment.doctor_id = doctor.id;
    appointment.service_id = service.map(|s| s.id);
    appointment.appointment_date = input.appointment_date;
    appointment.duration_minutes = minutes;
    appointment.status = input.status;
    appointment.notes = input.notes.clone();
    appointment.updated_at = Some(now);
    repository::update_appointment(&tx, &appointment)?;
    tx.commit()?;

    tracing::info!(appointment_id = %appointment.id, status = %appointment.status, "Appointment updated");
    Ok(appointment)
}

fn check_slot(
    conn: &Connection,
    input: &AppointmentInput,
    exclude: Option<&Uuid>,
    offset: &FixedOffset,
) -> Result<(Doctor, Option<Service>, u32), SchedulingError> {
    if repository::get_patient(conn, &input.patient_id)?.is_none() {
        return Err(SchedulingError::Validation("Patient not found".into()));
    }
    let doctor = repository::get_doctor(conn, &input.doctor_id)?
        .ok_or_else(|| SchedulingError::Validation("Doctor not found".into()))?;
    let service = match input.service_id {
        Some(service_id) => Some(
            repository::get_service(conn, &service_id)?
                .ok_or_else(|| SchedulingError::Validation("Service not found".into()))?,
        ),
        None => None,
    };
    let minutes = validate_appointment(input, service.as_ref())?;

    // A cancelled or no-show booking frees its slot, so it cannot collide.
    if !input.status.blocks_schedule() {
        return Ok((doctor, service, minutes));
    }

    let candidate = Interval::new(input.appointment_date, minutes);
    let existing = repository::list_booked_slots(
        conn,
        &doctor.id,
        service.as_ref().map(|s| &s.id),
        exclude,
    )?;
    if let Some(slot) = find_conflict(&candidate, &existing) {
        tracing::warn!(
            doctor_id = %doctor.id,
            conflicting = %slot.id,
            "Rejected overlapping appointment"
        );
        return Err(SchedulingError::Conflict {
            message: conflict_message(&doctor, service.as_ref(), input.appointment_date, offset),
        });
    }
    Ok((doctor, service, minutes))
}
