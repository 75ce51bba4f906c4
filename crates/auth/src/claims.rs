use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use peoplehub_core::{TenantId, UserId};

use crate::{Jti, Permission};

/// Access-token claims (transport-agnostic).
///
/// Timestamps are unix seconds so the struct maps 1:1 onto the JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user the token was issued to.
    pub sub: UserId,

    pub tenant_id: TenantId,

    pub username: String,

    /// Unique token id; the handle used to revoke this token before `exp`.
    pub jti: Jti,

    #[serde(rename = "permission", default)]
    pub permissions: Vec<Permission>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<Uuid>,

    pub iss: String,
    pub aud: String,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiry (unix seconds).
    pub exp: i64,
}

impl AccessClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of access-token claims.
///
/// Signature checks happen in [`crate::jwt`]; revocation checks happen in the
/// revocation registry.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
