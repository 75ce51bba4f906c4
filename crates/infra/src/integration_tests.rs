//! Integration tests for the full session pipeline.
//!
//! Tests: Orchestrator → TokenLifecycleService / RevocationRegistry /
//! TenantResolver → in-memory stores and cache
//!
//! Verifies:
//! - Refresh rotates on every use and rejects replays
//! - Logout revokes the access token and every refresh token in one unit
//! - Tenant and user gates on login and refresh
//! - Store failures surface; cache failures do not

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use peoplehub_auth::{
        AccessClaims, Hs256Jwt, Jti, JwtValidator, Permission, RefreshToken, TokenHash, UserAccount,
        UserStatus, VerifiedLogin,
    };
    use peoplehub_core::{Clock, ManualClock, RefreshTokenId, TenantId, TenantInfo, TenantSettings, UserId};

    use crate::credentials::{
        CommitReceipt, CredentialBatch, CredentialStore, CredentialStoreError, InMemoryCredentialStore,
    };
    use crate::deadline::Deadline;
    use crate::session::{AuthSessionOrchestrator, RequestContext, SessionError};
    use crate::tenancy::{
        CacheError, InMemoryKeyValueCache, InMemoryTenantDirectory, KeyValueCache, TenantDirectoryCache,
        TenantResolver,
    };
    use crate::tokens::{AccessTokenRevocationRegistry, TokenLifecycleService};
    use crate::users::InMemoryUserDirectory;

    const SECRET: &[u8] = b"integration-test-secret";

    struct Harness {
        orchestrator: AuthSessionOrchestrator,
        store: Arc<dyn CredentialStore>,
        tenants: Arc<InMemoryTenantDirectory>,
        users: Arc<InMemoryUserDirectory>,
        clock: Arc<ManualClock>,
        jwt: Hs256Jwt,
        tenant: TenantInfo,
        account: UserAccount,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(Arc::new(InMemoryCredentialStore::new()), None)
        }

        fn with(store: Arc<dyn CredentialStore>, cache: Option<Arc<dyn KeyValueCache>>) -> Self {
            let clock = Arc::new(ManualClock::new("2026-06-01T08:00:00Z".parse().unwrap()));
            let dyn_clock: Arc<dyn Clock> = clock.clone();
            let jwt = Hs256Jwt::new(SECRET, "peoplehub", "peoplehub-api");

            let tenant = TenantInfo {
                id: TenantId::new(),
                name: "Acme".to_string(),
                code: "acme".to_string(),
                domain: Some("acme.example.com".to_string()),
                is_active: true,
                settings: TenantSettings::default(),
            };
            let tenants = Arc::new(InMemoryTenantDirectory::new());
            tenants.upsert(tenant.clone()).unwrap();

            let account = UserAccount {
                user_id: UserId::new(),
                tenant_id: tenant.id,
                username: "ada".to_string(),
                status: UserStatus::Active,
                permissions: vec![Permission::new("employees.read")],
                employee_id: None,
            };
            let users = Arc::new(InMemoryUserDirectory::new());
            users.upsert(account.clone()).unwrap();

            let cache: Arc<dyn KeyValueCache> = match cache {
                Some(cache) => cache,
                None => Arc::new(InMemoryKeyValueCache::new(dyn_clock.clone())),
            };
            let resolver = TenantResolver::new(
                tenants.clone(),
                Arc::new(TenantDirectoryCache::new(cache, dyn_clock.clone())),
            );

            let orchestrator = AuthSessionOrchestrator::new(
                TokenLifecycleService::new(store.clone(), dyn_clock.clone(), Duration::days(14)),
                AccessTokenRevocationRegistry::new(store.clone(), dyn_clock.clone()),
                resolver,
                users.clone(),
                Arc::new(jwt.clone()),
                dyn_clock,
                Duration::minutes(120),
            );

            Self {
                orchestrator,
                store,
                tenants,
                users,
                clock,
                jwt,
                tenant,
                account,
            }
        }

        fn verified(&self) -> VerifiedLogin {
            VerifiedLogin {
                account: self.account.clone(),
                requires_mfa: false,
            }
        }

        fn claims(&self, access_token: &str) -> AccessClaims {
            self.jwt.validate(access_token, self.clock.now()).unwrap()
        }
    }

    fn ctx() -> RequestContext {
        RequestContext {
            ip: Some("203.0.113.7".to_string()),
            user_agent: Some("integration".to_string()),
            deadline: Deadline::none(),
        }
    }

    #[tokio::test]
    async fn login_returns_tokens_bound_to_account_and_tenant() {
        let h = Harness::new();
        let outcome = h.orchestrator.login(h.verified(), &ctx()).await.unwrap();

        assert!(!outcome.requires_mfa);
        assert_eq!(outcome.expires_in_seconds, 7200);
        assert_eq!(outcome.user_name, "ada");

        let claims = h.claims(outcome.access_token.as_deref().unwrap());
        assert_eq!(claims.sub, h.account.user_id);
        assert_eq!(claims.tenant_id, h.tenant.id);
        assert_eq!(claims.permissions, vec![Permission::new("employees.read")]);

        let refresh = outcome.refresh_token.unwrap();
        let stored = h
            .store
            .find_refresh_token_by_hash(&TokenHash::digest(&refresh))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.created_by_ip(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_secret_stops_working() {
        let h = Harness::new();
        let login = h.orchestrator.login(h.verified(), &ctx()).await.unwrap();
        let first = login.refresh_token.unwrap();

        let refreshed = h.orchestrator.refresh(&first, &ctx()).await.unwrap();
        let second = refreshed.refresh_token.clone().unwrap();
        assert_ne!(first, second);
        assert_ne!(
            h.claims(refreshed.access_token.as_deref().unwrap()).jti,
            h.claims(login.access_token.as_deref().unwrap()).jti
        );

        assert_eq!(
            h.orchestrator.refresh(&first, &ctx()).await.unwrap_err(),
            SessionError::InvalidCredential
        );
        assert!(h.orchestrator.refresh(&second, &ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn blank_refresh_secret_is_a_validation_error() {
        let h = Harness::new();
        let err = h.orchestrator.refresh("   ", &ctx()).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn refresh_failures_are_indistinguishable() {
        let h = Harness::new();
        let expired = h.orchestrator.login(h.verified(), &ctx()).await.unwrap().refresh_token.unwrap();
        let rotated = h.orchestrator.login(h.verified(), &ctx()).await.unwrap().refresh_token.unwrap();
        h.orchestrator.refresh(&rotated, &ctx()).await.unwrap();
        h.clock.advance(Duration::days(15));

        let errors = [
            h.orchestrator.refresh(&expired, &ctx()).await.unwrap_err(),
            h.orchestrator.refresh(&rotated, &ctx()).await.unwrap_err(),
            h.orchestrator.refresh("never-issued", &ctx()).await.unwrap_err(),
        ];
        for err in &errors {
            assert_eq!(err, &SessionError::InvalidCredential);
            assert_eq!(err.body(), errors[0].body());
        }
    }

    #[tokio::test]
    async fn logout_revokes_access_token_and_every_refresh_token() {
        let h = Harness::new();
        let phone = h.orchestrator.login(h.verified(), &ctx()).await.unwrap();
        let laptop = h.orchestrator.login(h.verified(), &ctx()).await.unwrap();
        let claims = h.claims(laptop.access_token.as_deref().unwrap());

        let ack = h.orchestrator.logout(&claims, &ctx()).await.unwrap();
        assert_eq!(ack.refresh_tokens_revoked, 2);
        assert!(ack.access_token_recorded);

        assert!(h
            .orchestrator
            .is_access_token_revoked(&claims.jti, Deadline::none())
            .await
            .unwrap());
        for secret in [phone.refresh_token.unwrap(), laptop.refresh_token.unwrap()] {
            assert_eq!(
                h.orchestrator.refresh(&secret, &ctx()).await.unwrap_err(),
                SessionError::InvalidCredential
            );
        }

        // retry is a no-op, not an error
        let again = h.orchestrator.logout(&claims, &ctx()).await.unwrap();
        assert_eq!(again.refresh_tokens_revoked, 0);
        assert!(!again.access_token_recorded);
    }

    #[tokio::test]
    async fn mfa_pending_mints_nothing() {
        let h = Harness::new();
        let mut verified = h.verified();
        verified.requires_mfa = true;

        let outcome = h.orchestrator.login(verified, &ctx()).await.unwrap();
        assert!(outcome.requires_mfa);
        assert!(outcome.access_token.is_none());
        assert!(outcome.refresh_token.is_none());
        assert!(h
            .store
            .active_refresh_tokens_for_user(h.account.user_id, h.clock.now())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn inactive_tenant_blocks_login_and_refresh() {
        let h = Harness::new();
        let refresh = h.orchestrator.login(h.verified(), &ctx()).await.unwrap().refresh_token.unwrap();

        // expire the cached snapshot, then deactivate in the store of record
        h.clock.advance(Duration::minutes(31));
        let mut tenant = h.tenant.clone();
        tenant.is_active = false;
        h.tenants.upsert(tenant).unwrap();

        assert_eq!(
            h.orchestrator.login(h.verified(), &ctx()).await.unwrap_err(),
            SessionError::TenantUnavailable
        );
        assert_eq!(
            h.orchestrator.refresh(&refresh, &ctx()).await.unwrap_err(),
            SessionError::InvalidCredential
        );
    }

    #[tokio::test]
    async fn suspended_or_deleted_user_cannot_refresh() {
        let h = Harness::new();
        let first = h.orchestrator.login(h.verified(), &ctx()).await.unwrap().refresh_token.unwrap();
        let second = h.orchestrator.login(h.verified(), &ctx()).await.unwrap().refresh_token.unwrap();

        h.users.set_status(h.account.user_id, UserStatus::Suspended).unwrap();
        assert_eq!(
            h.orchestrator.refresh(&first, &ctx()).await.unwrap_err(),
            SessionError::InvalidCredential
        );
        assert_eq!(
            h.orchestrator.login(h.verified_with_status(UserStatus::Suspended), &ctx()).await.unwrap_err(),
            SessionError::AccountDisabled
        );

        h.users.remove(h.account.user_id).unwrap();
        assert_eq!(
            h.orchestrator.refresh(&second, &ctx()).await.unwrap_err(),
            SessionError::InvalidCredential
        );
    }

    impl Harness {
        fn verified_with_status(&self, status: UserStatus) -> VerifiedLogin {
            let mut verified = self.verified();
            verified.account.status = status;
            verified
        }
    }

    #[tokio::test]
    async fn broken_cache_does_not_affect_sessions() {
        #[derive(Debug)]
        struct DownCache;

        #[async_trait]
        impl KeyValueCache for DownCache {
            async fn get_string(&self, _key: &str) -> Result<Option<String>, CacheError> {
                Err(CacheError::Unavailable("refused".to_string()))
            }

            async fn set_string(&self, _key: &str, _value: String, _ttl: StdDuration) -> Result<(), CacheError> {
                Err(CacheError::Unavailable("refused".to_string()))
            }
        }

        let h = Harness::with(Arc::new(InMemoryCredentialStore::new()), Some(Arc::new(DownCache)));
        let login = h.orchestrator.login(h.verified(), &ctx()).await.unwrap();
        let refreshed = h
            .orchestrator
            .refresh(login.refresh_token.as_deref().unwrap(), &ctx())
            .await
            .unwrap();
        assert!(refreshed.access_token.is_some());

        let resolved = h
            .orchestrator
            .resolve_tenant("acme.example.com", Deadline::none())
            .await
            .unwrap();
        assert_eq!(resolved, Some(h.tenant.clone()));
    }

    /// Delegates to an in-memory store until `fail_commits` is set.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: InMemoryCredentialStore,
        fail_commits: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CredentialStore for FlakyStore {
        async fn find_refresh_token_by_hash(
            &self,
            hash: &TokenHash,
        ) -> Result<Option<RefreshToken>, CredentialStoreError> {
            self.inner.find_refresh_token_by_hash(hash).await
        }

        async fn find_refresh_token(
            &self,
            id: RefreshTokenId,
        ) -> Result<Option<RefreshToken>, CredentialStoreError> {
            self.inner.find_refresh_token(id).await
        }

        async fn find_refresh_token_replaced_by(
            &self,
            successor: RefreshTokenId,
        ) -> Result<Option<RefreshToken>, CredentialStoreError> {
            self.inner.find_refresh_token_replaced_by(successor).await
        }

        async fn active_refresh_tokens_for_user(
            &self,
            user_id: UserId,
            now: DateTime<Utc>,
        ) -> Result<Vec<RefreshToken>, CredentialStoreError> {
            self.inner.active_refresh_tokens_for_user(user_id, now).await
        }

        async fn is_access_token_revoked(&self, jti: &Jti) -> Result<bool, CredentialStoreError> {
            self.inner.is_access_token_revoked(jti).await
        }

        async fn commit(&self, batch: CredentialBatch) -> Result<CommitReceipt, CredentialStoreError> {
            if self.fail_commits.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(CredentialStoreError::Unavailable("primary failed over".to_string()));
            }
            self.inner.commit(batch).await
        }

        async fn prune_revoked_access_tokens(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<u64, CredentialStoreError> {
            self.inner.prune_revoked_access_tokens(cutoff).await
        }
    }

    #[tokio::test]
    async fn failed_logout_is_reported_and_revokes_nothing() {
        let store = Arc::new(FlakyStore::default());
        let h = Harness::with(store.clone(), None);
        let login = h.orchestrator.login(h.verified(), &ctx()).await.unwrap();
        let claims = h.claims(login.access_token.as_deref().unwrap());

        store.fail_commits.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = h.orchestrator.logout(&claims, &ctx()).await.unwrap_err();
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
        assert!(!err.body().message.contains("primary"));

        assert!(!store.is_access_token_revoked(&claims.jti).await.unwrap());
        assert_eq!(
            store
                .active_refresh_tokens_for_user(h.account.user_id, h.clock.now())
                .await
                .unwrap()
                .len(),
            1
        );

        store.fail_commits.store(false, std::sync::atomic::Ordering::SeqCst);
        let ack = h.orchestrator.logout(&claims, &ctx()).await.unwrap();
        assert_eq!(ack.refresh_tokens_revoked, 1);
    }

    #[tokio::test]
    async fn elapsed_deadline_fails_without_touching_state() {
        let h = Harness::new();
        let login = h.orchestrator.login(h.verified(), &ctx()).await.unwrap();
        let refresh = login.refresh_token.unwrap();

        let expired = RequestContext {
            deadline: Deadline::after(StdDuration::ZERO),
            ..ctx()
        };
        tokio::time::sleep(StdDuration::from_millis(2)).await;
        let err = h.orchestrator.refresh(&refresh, &expired).await.unwrap_err();
        assert!(matches!(err, SessionError::DeadlineExceeded(_)));

        assert!(h.orchestrator.refresh(&refresh, &ctx()).await.is_ok());
    }
}
