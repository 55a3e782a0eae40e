use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::dashboard::{self, DashboardData};

/// `GET /api/dashboard` — greeting, counts and navigation.
pub async fn overview(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<DashboardData>, ApiError> {
    let conn = ctx.core.open_db()?;
    let data = dashboard::dashboard_data(&conn, &session.profile, Utc::now(), &ctx.core.utc_offset())?;
    Ok(Json(data))
}
