//! Issue, rotate and revoke refresh tokens.
//!
//! Rotation is split in two phases so a caller can run its own checks (user
//! still active, tenant still active) between validating the presented token
//! and committing the swap:
//!
//! 1. [`TokenLifecycleService::prepare_rotation`] looks the token up by hash
//!    and rejects unknown, revoked or expired tokens.
//! 2. [`TokenLifecycleService::commit_rotation`] revokes the old token, links
//!    it to a freshly issued successor and writes both in one batch. The
//!    revoke is conditional on the stored token still being unrevoked, so of
//!    several concurrent rotations of one token exactly one commits.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};

use peoplehub_auth::{RefreshSecret, RefreshToken, normalize_optional};
use peoplehub_core::{Clock, Entity, RefreshTokenId, TenantId, UserId};

use super::error::CredentialError;
use crate::credentials::{CommitReceipt, CredentialBatch, CredentialStore, CredentialStoreError, CredentialWrite};
use crate::deadline::Deadline;

/// A presented refresh token that passed lookup and is ready to be rotated.
#[derive(Debug, Clone)]
pub struct PendingRotation {
    current: RefreshToken,
}

impl PendingRotation {
    pub fn token(&self) -> &RefreshToken {
        &self.current
    }

    pub fn tenant_id(&self) -> TenantId {
        self.current.tenant_id()
    }

    pub fn user_id(&self) -> UserId {
        self.current.user_id()
    }
}

/// Result of a committed rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    /// The presented token, now revoked and linked to `issued`.
    pub previous: RefreshToken,
    pub issued: RefreshToken,
    /// Secret of `issued`; returned to the caller once and never stored.
    pub secret: RefreshSecret,
}

pub struct TokenLifecycleService {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    refresh_lifetime: Duration,
}

impl TokenLifecycleService {
    /// `refresh_lifetime` is clamped to at least one day.
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, refresh_lifetime: Duration) -> Self {
        Self {
            store,
            clock,
            refresh_lifetime: refresh_lifetime.max(Duration::days(1)),
        }
    }

    pub fn refresh_lifetime(&self) -> Duration {
        self.refresh_lifetime
    }

    /// Persist a new refresh token for an already generated secret.
    #[instrument(
        skip(self, secret, ip, user_agent, deadline),
        fields(tenant_id = %tenant_id, user_id = %user_id),
        err
    )]
    pub async fn issue(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        secret: &RefreshSecret,
        expires_at: DateTime<Utc>,
        ip: Option<&str>,
        user_agent: Option<&str>,
        deadline: Deadline,
    ) -> Result<RefreshToken, CredentialError> {
        let token = RefreshToken::issue(
            tenant_id,
            user_id,
            secret.hash(),
            expires_at,
            ip,
            user_agent,
            self.clock.now(),
        )?;

        self.commit(CredentialWrite::IssueRefreshToken(token.clone()).into(), deadline)
            .await?;
        info!(token_id = %token.id(), "refresh token issued");
        Ok(token)
    }

    /// Generate a secret and issue a token valid for the configured lifetime.
    pub async fn issue_for_session(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        ip: Option<&str>,
        user_agent: Option<&str>,
        deadline: Deadline,
    ) -> Result<(RefreshToken, RefreshSecret), CredentialError> {
        let secret = RefreshSecret::generate();
        let expires_at = self.clock.now() + self.refresh_lifetime;
        let token = self
            .issue(tenant_id, user_id, &secret, expires_at, ip, user_agent, deadline)
            .await?;
        Ok((token, secret))
    }

    /// Phase one of rotation: find the presented token and check it is usable.
    #[instrument(skip_all, err)]
    pub async fn prepare_rotation(
        &self,
        presented: &RefreshSecret,
        deadline: Deadline,
    ) -> Result<PendingRotation, CredentialError> {
        let hash = presented.hash();
        let Some(token) = deadline
            .run("credential_store.find_by_hash", self.store.find_refresh_token_by_hash(&hash))
            .await??
        else {
            debug!("refresh token not found");
            return Err(CredentialError::InvalidCredential);
        };

        if token.is_revoked() {
            warn!(
                token_id = %token.id(),
                user_id = %token.user_id(),
                replaced_by = ?token.replaced_by(),
                "revoked refresh token presented"
            );
            return Err(CredentialError::InvalidCredential);
        }
        if token.is_expired_at(self.clock.now()) {
            debug!(token_id = %token.id(), "refresh token expired");
            return Err(CredentialError::InvalidCredential);
        }

        Ok(PendingRotation { current: token })
    }

    /// Phase two of rotation: revoke the presented token and issue its successor.
    ///
    /// Fails with [`CredentialError::InvalidCredential`] if another rotation or
    /// a revocation committed first.
    #[instrument(
        skip_all,
        fields(token_id = %pending.current.id(), user_id = %pending.user_id()),
        err
    )]
    pub async fn commit_rotation(
        &self,
        pending: PendingRotation,
        ip: Option<&str>,
        user_agent: Option<&str>,
        deadline: Deadline,
    ) -> Result<Rotation, CredentialError> {
        let now = self.clock.now();
        let PendingRotation { current: mut previous } = pending;

        let secret = RefreshSecret::generate();
        let issued = RefreshToken::issue(
            previous.tenant_id(),
            previous.user_id(),
            secret.hash(),
            now + self.refresh_lifetime,
            ip,
            user_agent,
            now,
        )?;

        previous.mark_used(now);
        previous.revoke(Some(*issued.id()), ip, now);

        let mut batch = CredentialBatch::new();
        batch.push(CredentialWrite::SupersedeRefreshToken(previous.clone()));
        batch.push(CredentialWrite::IssueRefreshToken(issued.clone()));

        match self.commit(batch, deadline).await {
            Ok(_) => {}
            Err(CredentialError::Store(CredentialStoreError::Stale(reason))) => {
                warn!(%reason, "refresh token rotation lost to a concurrent change");
                return Err(CredentialError::InvalidCredential);
            }
            Err(e) => return Err(e),
        }

        info!(successor = %issued.id(), "refresh token rotated");
        Ok(Rotation {
            previous,
            issued,
            secret,
        })
    }

    /// Both rotation phases with no checks in between.
    pub async fn rotate(
        &self,
        presented: &RefreshSecret,
        ip: Option<&str>,
        user_agent: Option<&str>,
        deadline: Deadline,
    ) -> Result<Rotation, CredentialError> {
        let pending = self.prepare_rotation(presented, deadline).await?;
        self.commit_rotation(pending, ip, user_agent, deadline).await
    }

    /// Add a revoke-all-active write for `user_id` to `batch`.
    pub fn stage_revoke_all_for_user(
        &self,
        batch: &mut CredentialBatch,
        user_id: UserId,
        ip: Option<&str>,
    ) -> Result<(), CredentialError> {
        let user_id = user_id.ensure_present("user_id")?;
        batch.push(CredentialWrite::RevokeActiveForUser {
            user_id,
            revoked_at: self.clock.now(),
            ip: normalize_optional(ip),
        });
        Ok(())
    }

    /// Revoke every active refresh token of `user_id`. Returns how many were revoked.
    #[instrument(skip(self, ip, deadline), fields(user_id = %user_id), err)]
    pub async fn revoke_all_for_user(
        &self,
        user_id: UserId,
        ip: Option<&str>,
        deadline: Deadline,
    ) -> Result<u64, CredentialError> {
        let mut batch = CredentialBatch::new();
        self.stage_revoke_all_for_user(&mut batch, user_id, ip)?;
        let receipt = self.commit(batch, deadline).await?;
        info!(revoked = receipt.refresh_tokens_revoked, "refresh tokens revoked for user");
        Ok(receipt.refresh_tokens_revoked)
    }

    pub async fn active_tokens_for_user(
        &self,
        user_id: UserId,
        deadline: Deadline,
    ) -> Result<Vec<RefreshToken>, CredentialError> {
        let now = self.clock.now();
        Ok(deadline
            .run(
                "credential_store.active_for_user",
                self.store.active_refresh_tokens_for_user(user_id, now),
            )
            .await??)
    }

    /// Rotation history ending at `token_id`, oldest first.
    ///
    /// Empty when `token_id` is unknown.
    pub async fn trace_chain(
        &self,
        token_id: RefreshTokenId,
        deadline: Deadline,
    ) -> Result<Vec<RefreshToken>, CredentialError> {
        let Some(mut cursor) = deadline
            .run("credential_store.find_refresh_token", self.store.find_refresh_token(token_id))
            .await??
        else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::from([*cursor.id()]);
        let mut chain = vec![cursor.clone()];
        while let Some(predecessor) = deadline
            .run(
                "credential_store.find_replaced_by",
                self.store.find_refresh_token_replaced_by(*cursor.id()),
            )
            .await??
        {
            if !seen.insert(*predecessor.id()) {
                return Err(CredentialStoreError::Corrupt(format!(
                    "refresh token chain through {} loops",
                    predecessor.id()
                ))
                .into());
            }
            chain.push(predecessor.clone());
            cursor = predecessor;
        }

        chain.reverse();
        Ok(chain)
    }

    /// Commit a batch staged through this service and its siblings.
    pub async fn commit(
        &self,
        batch: CredentialBatch,
        deadline: Deadline,
    ) -> Result<CommitReceipt, CredentialError> {
        Ok(deadline
            .run("credential_store.commit", self.store.commit(batch))
            .await??)
    }
}
