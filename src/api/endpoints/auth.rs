//! Account endpoints.
//!
//! Public: `register`, `sign-in`, `forgot-password`, `reset-password`.
//! Session-protected: `sign-out`, `session`, `password`.
//!
//! Password hashing is CPU-bound, so those handlers run on the blocking pool.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::auth::{self, NewAccount, SignedIn};
use crate::authorization::{navigation_for, role_label, NavItem};
use crate::models::Profile;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

/// `POST /api/auth/register` — create an account.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(account): Json<NewAccount>,
) -> Result<(StatusCode, Json<ProfileResponse>), ApiError> {
    let core = ctx.core.clone();
    let profile = tokio::task::spawn_blocking(move || -> Result<Profile, ApiError> {
        let conn = core.open_db()?;
        Ok(auth::register(&conn, &account, Utc::now())?)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(ProfileResponse { profile })))
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/sign-in` — exchange credentials for a bearer token.
pub async fn sign_in(
    State(ctx): State<ApiContext>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignedIn>, ApiError> {
    let core = ctx.core.clone();
    let lockout = ctx.login_lockout.clone();
    let signed_in = tokio::task::spawn_blocking(move || -> Result<SignedIn, ApiError> {
        let conn = core.open_db()?;
        Ok(auth::sign_in(
            &conn,
            &lockout,
            &request.email,
            &request.password,
            core.session_ttl(),
            Utc::now(),
        )?)
    })
    .await??;

    Ok(Json(signed_in))
}

/// `POST /api/auth/sign-out` — revoke the calling session.
pub async fn sign_out(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::sign_out(&conn, &session.token)?;
    tracing::info!(user_id = %session.profile.id, "Signed out");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub profile: Profile,
    pub role_label: &'static str,
    pub is_admin: bool,
    pub navigation: Vec<NavItem>,
}

/// `GET /api/auth/session` — who am I, and what may I see.
pub async fn session(
    Extension(session): Extension<SessionContext>,
) -> Result<Json<SessionResponse>, ApiError> {
    let profile = session.profile;
    Ok(Json(SessionResponse {
        role_label: role_label(Some(profile.role)),
        is_admin: profile.is_admin(),
        navigation: navigation_for(profile.role),
        profile,
    }))
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// `POST /api/auth/forgot-password` — always 202, whether or not the
/// email has an account.
pub async fn forgot_password(
    State(ctx): State<ApiContext>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::request_password_reset(
        &conn,
        &request.email,
        &ctx.core.config.public_url,
        ctx.core.reset_delivery(),
        Utc::now(),
    )?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

/// `POST /api/auth/reset-password` — set a new password with a reset token.
pub async fn reset_password(
    State(ctx): State<ApiContext>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let conn = core.open_db()?;
        Ok(auth::reset_password(
            &conn,
            &request.token,
            &request.password,
            &request.confirm_password,
            Utc::now(),
        )?)
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

/// `PUT /api/auth/password` — change the signed-in user's password.
pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let core = ctx.core.clone();
    let user_id = session.profile.id;
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let conn = core.open_db()?;
        Ok(auth::change_password(
            &conn,
            &user_id,
            &request.password,
            &request.confirm_password,
            Utc::now(),
        )?)
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
