use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::services::AppServices;
use crate::middleware;

pub mod auth;
pub mod system;
pub mod tenants;

/// Endpoints reachable without an access token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/refresh", post(auth::refresh))
        .route("/tenants/resolve/:identifier", get(tenants::resolve))
}

/// Endpoints that require a valid, non-revoked access token, plus logout,
/// which accepts an already-revoked token so retries stay idempotent.
pub fn protected_router(services: Arc<AppServices>) -> Router {
    let session = Router::new()
        .route("/auth/logout", post(auth::logout))
        .layer(axum::middleware::from_fn_with_state(
            services.clone(),
            middleware::session_middleware,
        ));

    Router::new()
        .route("/auth/me", get(auth::me))
        .layer(axum::middleware::from_fn_with_state(
            services,
            middleware::auth_middleware,
        ))
        .merge(session)
}
