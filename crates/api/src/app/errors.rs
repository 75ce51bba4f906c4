use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use peoplehub_infra::SessionError;

/// Map a session failure to its HTTP status and `{code, message}` body.
pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    let status = match &err {
        SessionError::Validation(_) => StatusCode::BAD_REQUEST,
        SessionError::InvalidCredential => StatusCode::UNAUTHORIZED,
        SessionError::AccountDisabled | SessionError::TenantUnavailable => StatusCode::FORBIDDEN,
        SessionError::Unavailable(_) | SessionError::DeadlineExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    let body = err.body();
    json_error(status, body.code, body.message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "code": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
