use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use peoplehub_auth::{Jti, RefreshToken, RevokeOutcome, RevokedAccessToken, TokenHash};
use peoplehub_core::{Entity, RefreshTokenId, UserId};

use super::store::{CommitReceipt, CredentialBatch, CredentialStore, CredentialStoreError, CredentialWrite};

#[derive(Debug, Clone, Default)]
struct State {
    refresh_tokens: HashMap<RefreshTokenId, RefreshToken>,
    by_hash: HashMap<TokenHash, RefreshTokenId>,
    revoked_access_tokens: HashMap<Jti, RevokedAccessToken>,
}

impl State {
    fn apply(&mut self, write: CredentialWrite, receipt: &mut CommitReceipt) -> Result<(), CredentialStoreError> {
        match write {
            CredentialWrite::IssueRefreshToken(token) => {
                if self.by_hash.contains_key(token.token_hash()) {
                    return Err(CredentialStoreError::Conflict(
                        "refresh token hash already exists".to_string(),
                    ));
                }
                if self.refresh_tokens.contains_key(token.id()) {
                    return Err(CredentialStoreError::Conflict(format!(
                        "refresh token {} already exists",
                        token.id()
                    )));
                }
                self.by_hash.insert(token.token_hash().clone(), *token.id());
                self.refresh_tokens.insert(*token.id(), token);
                receipt.refresh_tokens_issued += 1;
            }
            CredentialWrite::SupersedeRefreshToken(token) => {
                let stored = self.refresh_tokens.get_mut(token.id()).ok_or_else(|| {
                    CredentialStoreError::Stale(format!("refresh token {} not found", token.id()))
                })?;
                if stored.is_revoked() {
                    return Err(CredentialStoreError::Stale(format!(
                        "refresh token {} already revoked",
                        token.id()
                    )));
                }
                if stored.token_hash() != token.token_hash() {
                    return Err(CredentialStoreError::Conflict(format!(
                        "refresh token {} hash mismatch",
                        token.id()
                    )));
                }
                *stored = token;
                receipt.refresh_tokens_revoked += 1;
            }
            CredentialWrite::RevokeActiveForUser {
                user_id,
                revoked_at,
                ip,
            } => {
                for token in self.refresh_tokens.values_mut() {
                    if token.user_id() != user_id || !token.is_active_at(revoked_at) {
                        continue;
                    }
                    if token.revoke(None, ip.as_deref(), revoked_at) == RevokeOutcome::Revoked {
                        receipt.refresh_tokens_revoked += 1;
                    }
                }
            }
            CredentialWrite::RecordRevokedAccessToken(record) => {
                if !self.revoked_access_tokens.contains_key(record.jti()) {
                    self.revoked_access_tokens.insert(record.jti().clone(), record);
                    receipt.access_tokens_recorded += 1;
                }
            }
        }
        Ok(())
    }
}

/// In-memory credential store.
///
/// Intended for tests/dev. Not optimized for performance: every commit
/// applies its batch to a copy of the state and swaps it in on success.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    state: RwLock<State>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, CredentialStoreError> {
        self.state
            .read()
            .map_err(|_| CredentialStoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_refresh_token_by_hash(
        &self,
        hash: &TokenHash,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        let state = self.read()?;
        Ok(state
            .by_hash
            .get(hash)
            .and_then(|id| state.refresh_tokens.get(id))
            .cloned())
    }

    async fn find_refresh_token(
        &self,
        id: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        Ok(self.read()?.refresh_tokens.get(&id).cloned())
    }

    async fn find_refresh_token_replaced_by(
        &self,
        successor: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        Ok(self
            .read()?
            .refresh_tokens
            .values()
            .find(|t| t.replaced_by() == Some(successor))
            .cloned())
    }

    async fn active_refresh_tokens_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, CredentialStoreError> {
        let mut active: Vec<RefreshToken> = self
            .read()?
            .refresh_tokens
            .values()
            .filter(|t| t.user_id() == user_id && t.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by_key(|t| t.created_at());
        Ok(active)
    }

    async fn is_access_token_revoked(&self, jti: &Jti) -> Result<bool, CredentialStoreError> {
        Ok(self.read()?.revoked_access_tokens.contains_key(jti))
    }

    async fn commit(&self, batch: CredentialBatch) -> Result<CommitReceipt, CredentialStoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CredentialStoreError::Unavailable("lock poisoned".to_string()))?;

        let mut next = state.clone();
        let mut receipt = CommitReceipt::default();
        for write in batch.into_writes() {
            next.apply(write, &mut receipt)?;
        }

        *state = next;
        Ok(receipt)
    }

    async fn prune_revoked_access_tokens(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, CredentialStoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CredentialStoreError::Unavailable("lock poisoned".to_string()))?;

        let before = state.revoked_access_tokens.len();
        state
            .revoked_access_tokens
            .retain(|_, record| record.expires_at() >= cutoff);
        Ok((before - state.revoked_access_tokens.len()) as u64)
    }
}
