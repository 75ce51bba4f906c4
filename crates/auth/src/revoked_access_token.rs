//! Revoked access-token identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use peoplehub_core::{DomainError, DomainResult, Entity, TenantId, UserId};

use crate::fields::normalize_optional;

/// Unique identifier of an issued access token (the `jti` claim).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jti(String);

impl Jti {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(DomainError::validation("jti must not be blank"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Jti {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An access token that must be rejected before its natural expiry.
///
/// Written once on logout and never mutated. The copied expiry tells
/// housekeeping when the record stops mattering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedAccessToken {
    tenant_id: TenantId,
    user_id: UserId,
    jti: Jti,
    expires_at: DateTime<Utc>,
    revoked_at: DateTime<Utc>,
    revoked_by_ip: Option<String>,
}

impl RevokedAccessToken {
    pub fn revoke(
        tenant_id: TenantId,
        user_id: UserId,
        jti: Jti,
        expires_at: DateTime<Utc>,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            tenant_id: tenant_id.ensure_present("tenant_id")?,
            user_id: user_id.ensure_present("user_id")?,
            jti,
            expires_at,
            revoked_at: now,
            revoked_by_ip: normalize_optional(ip),
        })
    }

    /// Rebuild a stored record (persistence only).
    pub fn from_parts(
        tenant_id: TenantId,
        user_id: UserId,
        jti: Jti,
        expires_at: DateTime<Utc>,
        revoked_at: DateTime<Utc>,
        revoked_by_ip: Option<String>,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            jti,
            expires_at,
            revoked_at,
            revoked_by_ip,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn jti(&self) -> &Jti {
        &self.jti
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn revoked_at(&self) -> DateTime<Utc> {
        self.revoked_at
    }

    pub fn revoked_by_ip(&self) -> Option<&str> {
        self.revoked_by_ip.as_deref()
    }

    /// The token it blocks has expired on its own; the record can be deleted.
    pub fn is_prunable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Entity for RevokedAccessToken {
    type Id = Jti;

    fn id(&self) -> &Self::Id {
        &self.jti
    }
}
