//! Service catalog endpoints. Writes are admin-only.

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
use crate::models::{Service, ServiceFilter, ServiceInput};
use crate::search::filter_services;
use crate::validation::validate_service;

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: Vec<Service>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(filter): Query<ServiceFilter>,
) -> Result<Json<ServicesResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let services = filter_services(repository::list_services(&conn)?, filter.q.as_deref());
    Ok(Json(ServicesResponse { services }))
}

#[derive(Serialize)]
pub struct ServiceResponse {
    pub service: Service,
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(input): Json<ServiceInput>,
) -> Result<(StatusCode, Json<ServiceResponse>), ApiError> {
    require_admin(&session.profile)?;
    validate_service(&input)?;
    let conn = ctx.core.open_db()?;

    let service = Service {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        description: input.description,
        duration_minutes: input.duration_minutes,
        price: input.price,
        created_at: Utc::now(),
    };
    repository::insert_service(&conn, &service)?;
    tracing::info!(service_id = %service.id, "Service added");

    Ok((StatusCode::CREATED, Json(ServiceResponse { service })))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<ServiceInput>,
) -> Result<Json<ServiceResponse>, ApiError> {
    require_admin(&session.profile)?;
    validate_service(&input)?;
    let conn = ctx.core.open_db()?;
    repository::update_service(&conn, &id, &input)?;
    let service = repository::get_service(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("service", id))?;
    Ok(Json(ServiceResponse { service }))
}

/// Appointments that used the service keep their slot with no service.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&session.profile)?;
    let conn = ctx.core.open_db()?;
    repository::delete_service(&conn, &id)?;
    tracing::info!(service_id = %id, "Service removed");
    Ok(StatusCode::NO_CONTENT)
}
