//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend selection and orchestrator assembly
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent `{code, message}` error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use peoplehub_infra::{AuthConfig, StorageConfig};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from configuration (entrypoint used by `main.rs`).
pub async fn build_app(config: &AuthConfig, storage: &StorageConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config, storage).await?;
    Ok(router(Arc::new(services)))
}

/// Router over already assembled services.
pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .merge(routes::public_router())
        .merge(routes::protected_router(services.clone()))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

pub use services::AppServices;
