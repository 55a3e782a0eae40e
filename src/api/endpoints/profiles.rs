//! Staff account administration (admin only).

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::authorization::require_admin;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{Profile, Role};

#[derive(Serialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<Profile>,
}

/// `GET /api/profiles`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<ProfilesResponse>, ApiError> {
    require_admin(&session.profile)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(ProfilesResponse {
        profiles: repository::list_profiles(&conn)?,
    }))
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

/// `PUT /api/profiles/:id/role` — an admin cannot change their own role.
pub async fn update_role(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<RoleRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    require_admin(&session.profile)?;
    if id == session.profile.id {
        return Err(ApiError::Forbidden("You cannot change your own role".into()));
    }

    let conn = ctx.core.open_db()?;
    repository::update_profile_role(&conn, &id, request.role)?;
    let profile = repository::get_profile(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("profile", id))?;
    tracing::info!(profile_id = %id, role = %profile.role, by = %session.profile.id, "Role changed");

    Ok(Json(ProfileResponse { profile }))
}
