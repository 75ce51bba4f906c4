//! Denylist of access tokens revoked before their natural expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use peoplehub_auth::{Jti, RevokedAccessToken};
use peoplehub_core::{Clock, TenantId, UserId};

use super::error::CredentialError;
use crate::credentials::{CredentialBatch, CredentialStore, CredentialWrite};
use crate::deadline::Deadline;

pub struct AccessTokenRevocationRegistry {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl AccessTokenRevocationRegistry {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Add an insert-if-absent write for `jti` to `batch`.
    pub fn stage_revoke(
        &self,
        batch: &mut CredentialBatch,
        tenant_id: TenantId,
        user_id: UserId,
        jti: Jti,
        expires_at: DateTime<Utc>,
        ip: Option<&str>,
    ) -> Result<(), CredentialError> {
        let record = RevokedAccessToken::revoke(tenant_id, user_id, jti, expires_at, ip, self.clock.now())?;
        batch.push(CredentialWrite::RecordRevokedAccessToken(record));
        Ok(())
    }

    /// Record `jti` as revoked. Returns false if it already was.
    #[instrument(skip(self, jti, ip, deadline), fields(user_id = %user_id), err)]
    pub async fn revoke(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        jti: Jti,
        expires_at: DateTime<Utc>,
        ip: Option<&str>,
        deadline: Deadline,
    ) -> Result<bool, CredentialError> {
        let mut batch = CredentialBatch::new();
        self.stage_revoke(&mut batch, tenant_id, user_id, jti, expires_at, ip)?;
        let receipt = deadline
            .run("credential_store.commit", self.store.commit(batch))
            .await??;
        Ok(receipt.access_tokens_recorded > 0)
    }

    pub async fn is_revoked(&self, jti: &Jti, deadline: Deadline) -> Result<bool, CredentialError> {
        Ok(deadline
            .run("credential_store.is_access_token_revoked", self.store.is_access_token_revoked(jti))
            .await??)
    }

    /// Drop records whose access token has expired on its own.
    #[instrument(skip_all, err)]
    pub async fn prune_expired(&self, deadline: Deadline) -> Result<u64, CredentialError> {
        let pruned = deadline
            .run(
                "credential_store.prune_revoked_access_tokens",
                self.store.prune_revoked_access_tokens(self.clock.now()),
            )
            .await??;
        if pruned > 0 {
            info!(pruned, "pruned expired access-token revocations");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;
    use chrono::Duration;
    use peoplehub_core::ManualClock;

    fn registry() -> (AccessTokenRevocationRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new("2026-05-04T08:00:00Z".parse().unwrap()));
        let registry = AccessTokenRevocationRegistry::new(Arc::new(InMemoryCredentialStore::new()), clock.clone());
        (registry, clock)
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (registry, clock) = registry();
        let jti = Jti::generate();
        let (tenant, user) = (TenantId::new(), UserId::new());
        let expires_at = clock.now() + Duration::hours(2);

        assert!(!registry.is_revoked(&jti, Deadline::none()).await.unwrap());
        let first = registry
            .revoke(tenant, user, jti.clone(), expires_at, Some("10.1.1.1"), Deadline::none())
            .await
            .unwrap();
        let second = registry
            .revoke(tenant, user, jti.clone(), expires_at, None, Deadline::none())
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert!(registry.is_revoked(&jti, Deadline::none()).await.unwrap());
        assert!(!registry.is_revoked(&Jti::generate(), Deadline::none()).await.unwrap());
    }

    #[tokio::test]
    async fn nil_user_is_rejected() {
        let (registry, clock) = registry();
        let err = registry
            .revoke(
                TenantId::new(),
                UserId::from_uuid(uuid::Uuid::nil()),
                Jti::generate(),
                clock.now(),
                None,
                Deadline::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Validation(_)));
    }

    #[tokio::test]
    async fn prune_removes_only_naturally_expired_entries() {
        let (registry, clock) = registry();
        let (tenant, user) = (TenantId::new(), UserId::new());
        let short = Jti::generate();
        let long = Jti::generate();

        registry
            .revoke(tenant, user, short.clone(), clock.now() + Duration::minutes(5), None, Deadline::none())
            .await
            .unwrap();
        registry
            .revoke(tenant, user, long.clone(), clock.now() + Duration::hours(2), None, Deadline::none())
            .await
            .unwrap();

        clock.advance(Duration::minutes(10));
        assert_eq!(registry.prune_expired(Deadline::none()).await.unwrap(), 1);
        assert!(!registry.is_revoked(&short, Deadline::none()).await.unwrap());
        assert!(registry.is_revoked(&long, Deadline::none()).await.unwrap());
    }
}
