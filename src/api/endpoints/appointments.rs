//! Appointment endpoints: list, booking, rescheduling and the month calendar.
//!
//! Booking and rescheduling go through `scheduling`, which holds an
//! IMMEDIATE transaction across the conflict check and the write.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::calendar::{build_month, local_date, MonthCursor, MonthView, MAX_YEAR, MIN_YEAR};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{AppointmentDetail, AppointmentFilter, AppointmentInput};
use crate::scheduling;
use crate::search::filter_appointments;

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<AppointmentDetail>,
}

/// `GET /api/appointments` — latest first; `?q=`, `?status=`, `?range=today|week|month`.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointments = filter_appointments(
        repository::list_appointment_details(&conn)?,
        filter.q.as_deref(),
        filter.status,
        filter.range,
        Utc::now(),
        &ctx.core.utc_offset(),
    );
    Ok(Json(AppointmentsResponse { appointments }))
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub appointment: AppointmentDetail,
}

fn load_detail(conn: &rusqlite::Connection, id: &Uuid) -> Result<AppointmentDetail, ApiError> {
    let detail = repository::get_appointment_detail(conn, id)?
        .ok_or_else(|| DatabaseError::not_found("appointment", id))?;
    Ok(detail)
}

/// `POST /api/appointments` — 409 when the doctor is already booked.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<AppointmentInput>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let appointment = scheduling::book_appointment(
        &mut conn,
        &input,
        Some(session.profile.id),
        &ctx.core.utc_offset(),
        Utc::now(),
    )?;
    let appointment = load_detail(&conn, &appointment.id)?;
    Ok((StatusCode::CREATED, Json(AppointmentResponse { appointment })))
}

/// `GET /api/appointments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointment = load_detail(&conn, &id)?;
    Ok(Json(AppointmentResponse { appointment }))
}

/// `PUT /api/appointments/:id` — full edit, including status changes.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<AppointmentInput>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    scheduling::reschedule_appointment(&mut conn, &id, &input, &ctx.core.utc_offset(), Utc::now())?;
    let appointment = load_detail(&conn, &id)?;
    Ok(Json(AppointmentResponse { appointment }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// `GET /api/appointments/calendar?year=&month=` — defaults to the current
/// clinic month.
pub async fn calendar(
    State(ctx): State<ApiContext>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<MonthView>, ApiError> {
    let offset = ctx.core.utc_offset();
    let today = local_date(Utc::now(), &offset);

    let cursor = match (query.year, query.month) {
        (None, None) => MonthCursor::containing(today),
        (Some(year), Some(month)) => MonthCursor::new(year, month)
            .ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Invalid month {year}-{month}: years run {MIN_YEAR} to {MAX_YEAR}, months 1 to 12"
                ))
            })?,
        _ => {
            return Err(ApiError::BadRequest(
                "year and month must be given together".into(),
            ))
        }
    };

    let conn = ctx.core.open_db()?;
    let (start, end) = cursor.bounds(&offset);
    let appointments = repository::list_appointment_details_between(&conn, &start, &end)?;
    Ok(Json(build_month(cursor, &appointments, &offset, today)))
}
