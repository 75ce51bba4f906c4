//! Refresh-token record.
//!
//! A record is created on login or rotation and afterwards only ever changes
//! through [`RefreshToken::mark_used`] and [`RefreshToken::revoke`]. Records
//! are never deleted: revoked ones stay around for audit and replay detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use peoplehub_core::{DomainResult, Entity, RefreshTokenId, TenantId, UserId};

use crate::TokenHash;
use crate::fields::normalize_optional;

/// Result of a revoke transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    /// The token was already revoked; nothing changed.
    AlreadyRevoked,
}

/// One issued refresh credential.
///
/// # Invariants
/// - Only the digest of the secret is held, never the secret.
/// - Once revoked, a token stays revoked; the first revocation's timestamp,
///   successor link and IP are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    id: RefreshTokenId,
    tenant_id: TenantId,
    user_id: UserId,
    token_hash: TokenHash,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    replaced_by: Option<RefreshTokenId>,
    last_used_at: Option<DateTime<Utc>>,
    created_by_ip: Option<String>,
    created_by_user_agent: Option<String>,
    revoked_by_ip: Option<String>,
}

/// Flat persistence shape of a [`RefreshToken`].
///
/// Stores read and write this; domain code goes through the entity methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: RefreshTokenId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub token_hash: TokenHash,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<RefreshTokenId>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_by_ip: Option<String>,
    pub created_by_user_agent: Option<String>,
    pub revoked_by_ip: Option<String>,
}

impl RefreshToken {
    /// Create a new, unrevoked token for `user_id` within `tenant_id`.
    pub fn issue(
        tenant_id: TenantId,
        user_id: UserId,
        token_hash: TokenHash,
        expires_at: DateTime<Utc>,
        ip: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let tenant_id = tenant_id.ensure_present("tenant_id")?;
        let user_id = user_id.ensure_present("user_id")?;

        Ok(Self {
            id: RefreshTokenId::new(),
            tenant_id,
            user_id,
            token_hash,
            created_at: now,
            expires_at,
            revoked_at: None,
            replaced_by: None,
            last_used_at: None,
            created_by_ip: normalize_optional(ip),
            created_by_user_agent: normalize_optional(user_agent),
            revoked_by_ip: None,
        })
    }

    pub fn from_record(record: RefreshTokenRecord) -> Self {
        Self {
            id: record.id,
            tenant_id: record.tenant_id,
            user_id: record.user_id,
            token_hash: record.token_hash,
            created_at: record.created_at,
            expires_at: record.expires_at,
            revoked_at: record.revoked_at,
            replaced_by: record.replaced_by,
            last_used_at: record.last_used_at,
            created_by_ip: record.created_by_ip,
            created_by_user_agent: record.created_by_user_agent,
            revoked_by_ip: record.revoked_by_ip,
        }
    }

    pub fn to_record(&self) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            token_hash: self.token_hash.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            replaced_by: self.replaced_by,
            last_used_at: self.last_used_at,
            created_by_ip: self.created_by_ip.clone(),
            created_by_user_agent: self.created_by_user_agent.clone(),
            revoked_by_ip: self.revoked_by_ip.clone(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn token_hash(&self) -> &TokenHash {
        &self.token_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Id of the token that superseded this one on rotation.
    pub fn replaced_by(&self) -> Option<RefreshTokenId> {
        self.replaced_by
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn created_by_ip(&self) -> Option<&str> {
        self.created_by_ip.as_deref()
    }

    pub fn created_by_user_agent(&self) -> Option<&str> {
        self.created_by_user_agent.as_deref()
    }

    pub fn revoked_by_ip(&self) -> Option<&str> {
        self.revoked_by_ip.as_deref()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Usable for rotation: neither revoked nor expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    /// Record a refresh attempt.
    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
    }

    /// Revoke the token, optionally linking the successor issued in its place.
    ///
    /// Idempotent: revoking an already revoked token changes nothing.
    pub fn revoke(
        &mut self,
        replaced_by: Option<RefreshTokenId>,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> RevokeOutcome {
        if self.revoked_at.is_some() {
            return RevokeOutcome::AlreadyRevoked;
        }
        self.revoked_at = Some(now);
        self.replaced_by = replaced_by;
        self.revoked_by_ip = normalize_optional(ip);
        RevokeOutcome::Revoked
    }
}

impl Entity for RefreshToken {
    type Id = RefreshTokenId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use peoplehub_core::DomainError;
    use uuid::Uuid;

    fn issue_at(now: DateTime<Utc>) -> RefreshToken {
        RefreshToken::issue(
            TenantId::new(),
            UserId::new(),
            TokenHash::digest("s1"),
            now + Duration::days(14),
            Some(" 10.0.0.1 "),
            Some(""),
            now,
        )
        .unwrap()
    }

    #[test]
    fn issue_rejects_empty_ids() {
        let now = Utc::now();
        let err = RefreshToken::issue(
            TenantId::from_uuid(Uuid::nil()),
            UserId::new(),
            TokenHash::digest("s1"),
            now + Duration::days(1),
            None,
            None,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("tenant_id")));

        let err = RefreshToken::issue(
            TenantId::new(),
            UserId::from_uuid(Uuid::nil()),
            TokenHash::digest("s1"),
            now + Duration::days(1),
            None,
            None,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("user_id")));
    }

    #[test]
    fn issue_normalizes_client_metadata() {
        let token = issue_at(Utc::now());
        assert_eq!(token.created_by_ip(), Some("10.0.0.1"));
        assert_eq!(token.created_by_user_agent(), None);
        assert!(!token.is_revoked());
    }

    #[test]
    fn expiry_is_inclusive_of_the_boundary() {
        let now = Utc::now();
        let token = issue_at(now);
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(token.expires_at()));
        assert!(!token.is_active_at(token.expires_at()));
    }

    #[test]
    fn revoke_is_idempotent_and_keeps_first_revocation() {
        let now = Utc::now();
        let mut token = issue_at(now);
        let successor = RefreshTokenId::new();

        assert_eq!(
            token.revoke(Some(successor), Some("10.0.0.2"), now),
            RevokeOutcome::Revoked
        );
        assert_eq!(
            token.revoke(None, Some("10.0.0.9"), now + Duration::minutes(5)),
            RevokeOutcome::AlreadyRevoked
        );

        assert!(token.is_revoked());
        assert_eq!(token.revoked_at(), Some(now));
        assert_eq!(token.replaced_by(), Some(successor));
        assert_eq!(token.revoked_by_ip(), Some("10.0.0.2"));
    }

    #[test]
    fn record_round_trip_preserves_state() {
        let now = Utc::now();
        let mut token = issue_at(now);
        token.mark_used(now);
        token.revoke(None, None, now);

        assert_eq!(RefreshToken::from_record(token.to_record()), token);
    }
}
