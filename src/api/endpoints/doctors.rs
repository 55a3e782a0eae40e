//! Doctor roster endpoints. Reads are open to any session; writes are
//! admin-only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::authorization::require_admin;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{Doctor, DoctorFilter, DoctorInput, DOCTOR_COLOR_PALETTE};
use crate::search::filter_doctors;
use crate::validation::validate_doctor;

#[derive(Serialize)]
pub struct DoctorsResponse {
    pub doctors: Vec<Doctor>,
    /// Colours offered by the roster form.
    pub palette: [&'static str; 8],
}

/// `GET /api/doctors` — roster ordered by first name (`?q=` filter).
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(filter): Query<DoctorFilter>,
) -> Result<Json<DoctorsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctors = filter_doctors(repository::list_doctors(&conn)?, filter.q.as_deref());
    Ok(Json(DoctorsResponse {
        doctors,
        palette: DOCTOR_COLOR_PALETTE,
    }))
}

#[derive(Serialize)]
pub struct DoctorResponse {
    pub doctor: Doctor,
}

/// `POST /api/doctors` — admin only.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<DoctorInput>,
) -> Result<(StatusCode, Json<DoctorResponse>), ApiError> {
    require_admin(&session.profile)?;
    let color = validate_doctor(&input)?;
    let conn = ctx.core.open_db()?;

    let doctor = Doctor {
        id: Uuid::new_v4(),
        user_id: input.user_id,
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        phone: input.phone,
        specialty: input.specialty.trim().to_string(),
        color,
        created_at: Utc::now(),
    };
    repository::insert_doctor(&conn, &doctor)?;
    tracing::info!(doctor_id = %doctor.id, "Doctor added");

    Ok((StatusCode::CREATED, Json(DoctorResponse { doctor })))
}

/// `PUT /api/doctors/:id` — admin only.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<DoctorInput>,
) -> Result<Json<DoctorResponse>, ApiError> {
    require_admin(&session.profile)?;
    let color = validate_doctor(&input)?;
    let conn = ctx.core.open_db()?;
    repository::update_doctor(&conn, &id, &input, &color)?;
    let doctor = repository::get_doctor(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("doctor", id))?;
    Ok(Json(DoctorResponse { doctor }))
}

/// `DELETE /api/doctors/:id` — admin only. Removes the doctor's
/// appointments and records with it.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&session.profile)?;
    let conn = ctx.core.open_db()?;
    repository::delete_doctor(&conn, &id)?;
    tracing::info!(doctor_id = %id, "Doctor removed");
    Ok(StatusCode::NO_CONTENT)
}
