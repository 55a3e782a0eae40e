//! Clinic API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Session validator → 3. Audit logger
//!
//! Health and the account-recovery routes skip 2 and 3.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the clinic API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn clinic_api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

pub(crate) fn build_router(ctx: ApiContext) -> Router {
    let cors = cors_layer(&ctx.core.config.public_url);

    // Layers are applied from bottom (innermost) to top (outermost).
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/dashboard", get(endpoints::dashboard::overview))
        .route("/auth/sign-out", post(endpoints::auth::sign_out))
        .route("/auth/session", get(endpoints::auth::session))
        .route("/auth/password", put(endpoints::auth::change_password))
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail).put(endpoints::patients::update),
        )
        .route(
            "/patients/:id/appointments",
            get(endpoints::patients::appointments),
        )
        .route(
            "/patients/:id/medical-records",
            get(endpoints::patients::medical_records),
        )
        .route(
            "/doctors",
            get(endpoints::doctors::list).post(endpoints::doctors::create),
        )
        .route(
            "/doctors/:id",
            put(endpoints::doctors::update).delete(endpoints::doctors::delete),
        )
        .route(
            "/services",
            get(endpoints::services::list).post(endpoints::services::create),
        )
        .route(
            "/services/:id",
            put(endpoints::services::update).delete(endpoints::services::delete),
        )
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::create),
        )
        .route(
            "/appointments/calendar",
            get(endpoints::appointments::calendar),
        )
        .route(
            "/appointments/:id",
            get(endpoints::appointments::detail).put(endpoints::appointments::update),
        )
        .route(
            "/medical-records",
            get(endpoints::medical_records::list).post(endpoints::medical_records::create),
        )
        .route(
            "/medical-records/:id",
            put(endpoints::medical_records::update),
        )
        .route("/profiles", get(endpoints::profiles::list))
        .route("/profiles/:id/role", put(endpoints::profiles::update_role))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_session))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/sign-in", post(endpoints::auth::sign_in))
        .route("/auth/forgot-password", post(endpoints::auth::forgot_password))
        .route("/auth/reset-password", post(endpoints::auth::reset_password))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    let router = Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Browser access is limited to the configured front-end origin.
fn cors_layer(public_url: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(public_url) {
        Ok(origin) => origin,
        Err(_) => {
            tracing::warn!(public_url, "Public URL is not a valid origin, CORS disabled");
            return None;
        }
    };
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}
