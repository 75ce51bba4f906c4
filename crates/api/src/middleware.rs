use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use peoplehub_auth::{AccessClaims, JwtValidator};
use peoplehub_core::Clock;

use crate::app::errors::{json_error, session_error_to_response};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// Verify the bearer token and reject revoked ones.
///
/// A revocation check that cannot be answered fails the request.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = verify_bearer(&services, req.headers())?;

    let revoked = services
        .orchestrator
        .is_access_token_revoked(&claims.jti, services.deadline())
        .await
        .map_err(|e| {
            warn!(error = %e, "revocation check failed; rejecting request");
            session_error_to_response(e)
        })?;
    if revoked {
        return Err(json_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "access token has been revoked",
        ));
    }

    attach_principal(&mut req, claims);
    Ok(next.run(req).await)
}

/// Signature and time-window check only.
///
/// Used by logout: a caller whose token is already revoked is already logged
/// out, so a retried logout still reaches the handler.
pub async fn session_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = verify_bearer(&services, req.headers())?;
    attach_principal(&mut req, claims);
    Ok(next.run(req).await)
}

fn verify_bearer(services: &AppServices, headers: &HeaderMap) -> Result<AccessClaims, Response> {
    let token = extract_bearer(headers)
        .map_err(|status| json_error(status, "UNAUTHORIZED", "missing or malformed bearer token"))?;

    services
        .jwt
        .validate(token, services.clock.now())
        .map_err(|_e| json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "invalid access token"))
}

fn attach_principal(req: &mut Request<Body>, claims: AccessClaims) {
    req.extensions_mut().insert(TenantContext::new(claims.tenant_id));
    req.extensions_mut().insert(PrincipalContext::new(claims));
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
