use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Datelike, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::calendar::{is_supported_year, MAX_YEAR, MIN_YEAR};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{MedicalRecord, MedicalRecordDetail, MedicalRecordFilter, MedicalRecordInput};
use crate::search::filter_medical_records;

#[derive(Serialize)]
pub struct MedicalRecordsResponse {
    pub medical_records: Vec<MedicalRecordDetail>,
}

/// `GET /api/medical-records` — `?q=` and `?doctor_id=` filters.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(filter): Query<MedicalRecordFilter>,
) -> Result<Json<MedicalRecordsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let medical_records = filter_medical_records(
        repository::list_medical_record_details(&conn)?,
        filter.q.as_deref(),
        filter.doctor_id,
    );
    Ok(Json(MedicalRecordsResponse { medical_records }))
}

#[derive(Serialize)]
pub struct MedicalRecordResponse {
    pub medical_record: MedicalRecord,
}

// Record date within stored years; a linked appointment must be one of the
// same patient's visits.
fn check_record(conn: &Connection, input: &MedicalRecordInput) -> Result<(), ApiError> {
    if !is_supported_year(input.record_date.year()) {
        return Err(ApiError::Unprocessable(format!(
            "Record date must fall between years {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    let Some(appointment_id) = input.appointment_id else {
        return Ok(());
    };
    match repository::get_appointment(conn, &appointment_id)? {
        Some(appt) if appt.patient_id == input.patient_id => Ok(()),
        Some(_) => Err(ApiError::Unprocessable(
            "Appointment belongs to a different patient".into(),
        )),
        None => Err(ApiError::Unprocessable("Appointment not found".into())),
    }
}

/// `POST /api/medical-records`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<MedicalRecordInput>,
) -> Result<(StatusCode, Json<MedicalRecordResponse>), ApiError> {
    let conn = ctx.core.open_db()?;
    check_record(&conn, &input)?;

    let record = MedicalRecord {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        doctor_id: input.doctor_id,
        appointment_id: input.appointment_id,
        diagnosis: input.diagnosis,
        treatment: input.treatment,
        medications: input.medications,
        notes: input.notes,
        record_date: input.record_date,
        created_by: Some(session.profile.id),
        created_at: Utc::now(),
    };
    repository::insert_medical_record(&conn, &record)?;
    tracing::info!(record_id = %record.id, patient_id = %record.patient_id, "Medical record added");

    Ok((
        StatusCode::CREATED,
        Json(MedicalRecordResponse { medical_record: record }),
    ))
}

/// `PUT /api/medical-records/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<MedicalRecordInput>,
) -> Result<Json<MedicalRecordResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    check_record(&conn, &input)?;
    repository::update_medical_record(&conn, &id, &input)?;
    let medical_record = repository::get_medical_record(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("medical_record", id))?;
    Ok(Json(MedicalRecordResponse { medical_record }))
}
