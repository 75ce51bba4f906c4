use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use peoplehub_auth::{Jti, RefreshToken, RevokedAccessToken, TokenHash};
use peoplehub_core::{RefreshTokenId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    /// A conditional write found the record already changed by someone else.
    #[error("stale write: {0}")]
    Stale(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt credential record: {0}")]
    Corrupt(String),
}

/// One state change inside a [`CredentialBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialWrite {
    /// Insert a new refresh token. A duplicate hash is a conflict.
    IssueRefreshToken(RefreshToken),

    /// Overwrite a refresh token with its revoked state.
    ///
    /// Only applies while the stored record is still unrevoked; otherwise the
    /// whole batch fails with [`CredentialStoreError::Stale`].
    SupersedeRefreshToken(RefreshToken),

    /// Revoke every unrevoked, unexpired refresh token of a user.
    RevokeActiveForUser {
        user_id: UserId,
        revoked_at: DateTime<Utc>,
        ip: Option<String>,
    },

    /// Insert a revoked access token unless its jti is already recorded.
    RecordRevokedAccessToken(RevokedAccessToken),
}

/// Ordered writes committed as one atomic unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBatch {
    writes: Vec<CredentialWrite>,
}

impl CredentialBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: CredentialWrite) {
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[CredentialWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<CredentialWrite> {
        self.writes
    }
}

impl From<CredentialWrite> for CredentialBatch {
    fn from(write: CredentialWrite) -> Self {
        Self {
            writes: vec![write],
        }
    }
}

/// What a committed batch actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub refresh_tokens_issued: u64,
    pub refresh_tokens_revoked: u64,
    pub access_tokens_recorded: u64,
}

/// Store of record for credential state.
///
/// Lookups by hash or id are not tenant-filtered: a token hash is globally
/// unique and is the only handle a refresh caller presents.
///
/// `commit` is all-or-nothing. If the returned future is dropped before it
/// resolves, the store holds either every write of the batch or none of them.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_refresh_token_by_hash(
        &self,
        hash: &TokenHash,
    ) -> Result<Option<RefreshToken>, CredentialStoreError>;

    async fn find_refresh_token(
        &self,
        id: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError>;

    /// The token whose successor link points at `successor`.
    async fn find_refresh_token_replaced_by(
        &self,
        successor: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError>;

    async fn active_refresh_tokens_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, CredentialStoreError>;

    async fn is_access_token_revoked(&self, jti: &Jti) -> Result<bool, CredentialStoreError>;

    async fn commit(&self, batch: CredentialBatch) -> Result<CommitReceipt, CredentialStoreError>;

    /// Delete revoked-access-token records whose token expired before `cutoff`.
    async fn prune_revoked_access_tokens(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, CredentialStoreError>;
}

#[async_trait]
impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    async fn find_refresh_token_by_hash(
        &self,
        hash: &TokenHash,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        (**self).find_refresh_token_by_hash(hash).await
    }

    async fn find_refresh_token(
        &self,
        id: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        (**self).find_refresh_token(id).await
    }

    async fn find_refresh_token_replaced_by(
        &self,
        successor: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        (**self).find_refresh_token_replaced_by(successor).await
    }

    async fn active_refresh_tokens_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, CredentialStoreError> {
        (**self).active_refresh_tokens_for_user(user_id, now).await
    }

    async fn is_access_token_revoked(&self, jti: &Jti) -> Result<bool, CredentialStoreError> {
        (**self).is_access_token_revoked(jti).await
    }

    async fn commit(&self, batch: CredentialBatch) -> Result<CommitReceipt, CredentialStoreError> {
        (**self).commit(batch).await
    }

    async fn prune_revoked_access_tokens(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, CredentialStoreError> {
        (**self).prune_revoked_access_tokens(cutoff).await
    }
}
