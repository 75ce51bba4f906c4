use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::dto::TenantResponse;
use crate::app::errors::{json_error, session_error_to_response};
use crate::app::services::AppServices;

pub async fn resolve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(identifier): Path<String>,
) -> axum::response::Response {
    match services
        .orchestrator
        .resolve_tenant(&identifier, services.deadline())
        .await
    {
        Ok(Some(tenant)) => (StatusCode::OK, Json(TenantResponse::from(tenant))).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "TENANT_NOT_FOUND", "tenant not found"),
        Err(e) => session_error_to_response(e),
    }
}
