use chrono::{DateTime, Utc};

use peoplehub_auth::{AccessClaims, Jti, Permission};
use peoplehub_core::{TenantId, UserId};
use peoplehub_infra::{Deadline, RequestContext};

/// Tenant context for a request.
///
/// Derived from the verified access token; immutable for the request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated caller: the verified, non-revoked access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: AccessClaims,
}

impl PrincipalContext {
    pub fn new(claims: AccessClaims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> UserId {
        self.claims.sub
    }

    pub fn username(&self) -> &str {
        &self.claims.username
    }

    pub fn jti(&self) -> &Jti {
        &self.claims.jti
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.claims.permissions
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }
}

/// Build the per-request context from headers.
///
/// The client address is the first `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn request_context(headers: &axum::http::HeaderMap, deadline: Deadline) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let ip = header("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|first| first.trim().to_string()))
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"));

    RequestContext {
        ip,
        user_agent: header(axum::http::header::USER_AGENT.as_str()),
        deadline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("mobile/1.2"));

        let ctx = request_context(&headers, Deadline::none());
        assert_eq!(ctx.ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(ctx.user_agent.as_deref(), Some("mobile/1.2"));
    }

    #[test]
    fn missing_headers_leave_fields_absent() {
        let ctx = request_context(&HeaderMap::new(), Deadline::none());
        assert_eq!(ctx.ip, None);
        assert_eq!(ctx.user_agent, None);
    }
}
