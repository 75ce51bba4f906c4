use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::app::dto::{MeResponse, RefreshRequest};
use crate::app::errors::{json_error, session_error_to_response};
use crate::app::services::AppServices;
use crate::context::{request_context, PrincipalContext};

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> axum::response::Response {
    let Ok(Json(body)) = body else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "request body must be JSON with a refreshToken field",
        );
    };

    let ctx = request_context(&headers, services.deadline());
    match services.orchestrator.refresh(&body.refresh_token, &ctx).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => session_error_to_response(e),
    }
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
) -> axum::response::Response {
    let ctx = request_context(&headers, services.deadline());
    match services.orchestrator.logout(principal.claims(), &ctx).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => session_error_to_response(e),
    }
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(MeResponse::from(&principal))
}
