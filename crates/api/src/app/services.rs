//! Service wiring: picks in-memory or Postgres/Redis backends and assembles
//! the session orchestrator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::PgPool;

use peoplehub_auth::{Hs256Jwt, JwtValidator};
use peoplehub_core::{Clock, SystemClock};
use peoplehub_infra::credentials::{CredentialStore, InMemoryCredentialStore, PostgresCredentialStore};
use peoplehub_infra::tenancy::{
    InMemoryKeyValueCache, InMemoryTenantDirectory, KeyValueCache, PostgresTenantDirectory,
    TenantDirectory, TenantDirectoryCache, TenantResolver,
};
use peoplehub_infra::tokens::{AccessTokenRevocationRegistry, TokenLifecycleService};
use peoplehub_infra::{
    AuthConfig, AuthSessionOrchestrator, Deadline, InMemoryUserDirectory, PostgresUserDirectory,
    StorageConfig, UserDirectory,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything request handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub orchestrator: Arc<AuthSessionOrchestrator>,
    pub jwt: Arc<dyn JwtValidator>,
    pub clock: Arc<dyn Clock>,
    pub request_timeout: Duration,
}

impl AppServices {
    /// Deadline for the store and cache calls of one request.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}

/// Handles to the in-memory backends, for seeding in tests and local runs.
#[derive(Clone)]
pub struct InMemoryBackends {
    pub credentials: Arc<InMemoryCredentialStore>,
    pub tenants: Arc<InMemoryTenantDirectory>,
    pub users: Arc<InMemoryUserDirectory>,
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// Redis for the tenant cache when `REDIS_URL` is set, in-memory otherwise.
pub async fn build_services(config: &AuthConfig, storage: &StorageConfig) -> anyhow::Result<AppServices> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = build_cache(storage, clock.clone()).await?;

    match storage.database_url.as_deref() {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            tracing::info!("using Postgres credential, tenant and user stores");
            assemble(
                config,
                clock,
                Arc::new(PostgresCredentialStore::new(pool.clone())),
                Arc::new(PostgresTenantDirectory::new(pool.clone())),
                Arc::new(PostgresUserDirectory::new(pool)),
                cache,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            let backends = in_memory_backends();
            assemble(
                config,
                clock,
                backends.credentials,
                backends.tenants,
                backends.users,
                cache,
            )
        }
    }
}

/// In-memory services plus handles to seed them.
pub fn build_in_memory_services(
    config: &AuthConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<(AppServices, InMemoryBackends)> {
    let backends = in_memory_backends();
    let services = assemble(
        config,
        clock.clone(),
        backends.credentials.clone(),
        backends.tenants.clone(),
        backends.users.clone(),
        Arc::new(InMemoryKeyValueCache::new(clock)),
    )?;
    Ok((services, backends))
}

fn in_memory_backends() -> InMemoryBackends {
    InMemoryBackends {
        credentials: Arc::new(InMemoryCredentialStore::new()),
        tenants: Arc::new(InMemoryTenantDirectory::new()),
        users: Arc::new(InMemoryUserDirectory::new()),
    }
}

#[cfg(feature = "redis")]
async fn build_cache(storage: &StorageConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn KeyValueCache>> {
    match storage.redis_url.as_deref() {
        Some(url) => {
            let cache = peoplehub_infra::tenancy::RedisKeyValueCache::connect(url)
                .await
                .context("failed to connect to Redis")?;
            tracing::info!("using Redis tenant cache");
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(InMemoryKeyValueCache::new(clock))),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_cache(storage: &StorageConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn KeyValueCache>> {
    if storage.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but redis feature not enabled, falling back to in-memory cache");
    }
    Ok(Arc::new(InMemoryKeyValueCache::new(clock)))
}

fn assemble(
    config: &AuthConfig,
    clock: Arc<dyn Clock>,
    credentials: Arc<dyn CredentialStore>,
    tenants: Arc<dyn TenantDirectory>,
    users: Arc<dyn UserDirectory>,
    cache: Arc<dyn KeyValueCache>,
) -> anyhow::Result<AppServices> {
    let secret = config.require_jwt_secret()?;
    let jwt = Arc::new(Hs256Jwt::new(
        secret.as_bytes(),
        config.jwt_issuer.clone(),
        config.jwt_audience.clone(),
    ));

    let cache = TenantDirectoryCache::new(cache, clock.clone())
        .with_disable_window(config.tenant_cache_disable_window)
        .with_op_timeout(config.tenant_cache_op_timeout);
    let resolver = TenantResolver::new(tenants, Arc::new(cache)).with_entry_ttl(config.tenant_cache_ttl);

    let orchestrator = AuthSessionOrchestrator::new(
        TokenLifecycleService::new(
            credentials.clone(),
            clock.clone(),
            config.refresh_token_lifetime_chrono(),
        ),
        AccessTokenRevocationRegistry::new(credentials, clock.clone()),
        resolver,
        users,
        jwt.clone(),
        clock.clone(),
        config.access_token_lifetime_chrono(),
    );

    Ok(AppServices {
        orchestrator: Arc::new(orchestrator),
        jwt,
        clock,
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    })
}
