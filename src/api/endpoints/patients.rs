//! Patient endpoints.
//!
//! - `GET /api/patients` — list, newest first (`?q=` filter)
//! - `POST /api/patients` — create
//! - `GET /api/patients/:id` — patient with appointments and records
//! - `PUT /api/patients/:id` — update
//! - `GET /api/patients/:id/appointments`
//! - `GET /api/patients/:id/medical-records`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::calendar::local_date;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{AppointmentDetail, MedicalRecordDetail, Patient, PatientFilter, PatientInput};
use crate::search::{age_on, filter_patients};
use crate::validation::validate_patient;

#[derive(Serialize)]
pub struct PatientSummary {
    #[serde(flatten)]
    pub patient: Patient,
    pub age: Option<i32>,
}

impl PatientSummary {
    fn new(patient: Patient, today: NaiveDate) -> Self {
        let age = patient.date_of_birth.map(|dob| age_on(dob, today));
        Self { patient, age }
    }
}

#[derive(Serialize)]
pub struct PatientsResponse {
    pub patients: Vec<PatientSummary>,
}

fn clinic_today(ctx: &ApiContext) -> NaiveDate {
    local_date(Utc::now(), &ctx.core.utc_offset())
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<PatientsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let today = clinic_today(&ctx);
    let patients = filter_patients(repository::list_patients(&conn)?, filter.q.as_deref())
        .into_iter()
        .map(|p| PatientSummary::new(p, today))
        .collect();
    Ok(Json(PatientsResponse { patients }))
}

#[derive(Serialize)]
pub struct PatientResponse {
    pub patient: PatientSummary,
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<PatientInput>,
) -> Result<(StatusCode, Json<PatientResponse>), ApiError> {
    validate_patient(&input)?;
    let conn = ctx.core.open_db()?;

    let patient = Patient {
        id: Uuid::new_v4(),
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        email: input.email,
        phone: input.phone,
        date_of_birth: input.date_of_birth,
        address: input.address,
        emergency_contact_name: input.emergency_contact_name,
        emergency_contact_phone: input.emergency_contact_phone,
        medical_notes: input.medical_notes,
        created_by: Some(session.profile.id),
        created_at: Utc::now(),
        updated_at: None,
    };
    repository::insert_patient(&conn, &patient)?;
    tracing::info!(patient_id = %patient.id, "Patient created");

    Ok((
        StatusCode::CREATED,
        Json(PatientResponse {
            patient: PatientSummary::new(patient, clinic_today(&ctx)),
        }),
    ))
}

#[derive(Serialize)]
pub struct PatientDetailResponse {
    pub patient: PatientSummary,
    pub appointments: Vec<AppointmentDetail>,
    pub medical_records: Vec<MedicalRecordDetail>,
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientDetailResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = repository::get_patient(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("patient", id))?;

    Ok(Json(PatientDetailResponse {
        patient: PatientSummary::new(patient, clinic_today(&ctx)),
        appointments: repository::list_patient_appointments(&conn, &id)?,
        medical_records: repository::list_patient_medical_records(&conn, &id)?,
    }))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<PatientInput>,
) -> Result<Json<PatientResponse>, ApiError> {
    validate_patient(&input)?;
    let conn = ctx.core.open_db()?;
    repository::update_patient(&conn, &id, &input, Utc::now())?;
    let patient = repository::get_patient(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("patient", id))?;
    tracing::info!(patient_id = %id, "Patient updated");

    Ok(Json(PatientResponse {
        patient: PatientSummary::new(patient, clinic_today(&ctx)),
    }))
}

#[derive(Serialize)]
pub struct PatientAppointmentsResponse {
    pub appointments: Vec<AppointmentDetail>,
}

/// Used by the medical-record form to link a record to a visit.
pub async fn appointments(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientAppointmentsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    if repository::get_patient(&conn, &id)?.is_none() {
        return Err(DatabaseError::not_found("patient", id).into());
    }
    Ok(Json(PatientAppointmentsResponse {
        appointments: repository::list_patient_appointments(&conn, &id)?,
    }))
}

#[derive(Serialize)]
pub struct PatientRecordsResponse {
    pub medical_records: Vec<MedicalRecordDetail>,
}

pub async fn medical_records(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientRecordsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    if repository::get_patient(&conn, &id)?.is_none() {
        return Err(DatabaseError::not_found("patient", id).into());
    }
    Ok(Json(PatientRecordsResponse {
        medical_records: repository::list_patient_medical_records(&conn, &id)?,
    }))
}
