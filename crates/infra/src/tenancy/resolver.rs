//! Cache-aside tenant lookup.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use peoplehub_core::{TenantId, TenantInfo};

use super::cache::{DEFAULT_ENTRY_TTL, TenantCacheKey, TenantDirectoryCache};
use super::directory::{TenantDirectory, TenantDirectoryError};
use crate::deadline::{Deadline, DeadlineExceeded};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantLookupError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Directory(#[from] TenantDirectoryError),

    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),
}

/// Resolves tenants by identifier or id, consulting the shared cache first.
///
/// Unknown tenants resolve to `Ok(None)` and are not cached. The cache never
/// changes the answer, only how it is obtained.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    cache: Arc<TenantDirectoryCache>,
    entry_ttl: Duration,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>, cache: Arc<TenantDirectoryCache>) -> Self {
        Self {
            directory,
            cache,
            entry_ttl: DEFAULT_ENTRY_TTL,
        }
    }

    pub fn with_entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Tenant whose code or domain equals the trimmed `identifier`.
    #[instrument(skip(self, deadline), err)]
    pub async fn resolve_by_identifier(
        &self,
        identifier: &str,
        deadline: Deadline,
    ) -> Result<Option<TenantInfo>, TenantLookupError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(TenantLookupError::Validation(
                "tenant identifier must not be empty".to_string(),
            ));
        }

        let key = TenantCacheKey::Identifier(identifier.to_string());
        if let Some(hit) = deadline.run("tenant_cache.get", self.cache.get(&key)).await? {
            debug!("tenant cache hit");
            return Ok(Some(hit));
        }

        let found = deadline
            .run(
                "tenant_directory.find_by_identifier",
                self.directory.find_by_identifier_unscoped(identifier),
            )
            .await??;
        self.fill(&key, found, deadline).await
    }

    #[instrument(skip(self, deadline), fields(tenant_id = %tenant_id), err)]
    pub async fn resolve_by_id(
        &self,
        tenant_id: TenantId,
        deadline: Deadline,
    ) -> Result<Option<TenantInfo>, TenantLookupError> {
        let tenant_id = tenant_id
            .ensure_present("tenant_id")
            .map_err(|e| TenantLookupError::Validation(e.to_string()))?;

        let key = TenantCacheKey::Id(tenant_id);
        if let Some(hit) = deadline.run("tenant_cache.get", self.cache.get(&key)).await? {
            debug!("tenant cache hit");
            return Ok(Some(hit));
        }

        let found = deadline
            .run(
                "tenant_directory.find_by_id",
                self.directory.find_by_id_unscoped(tenant_id),
            )
            .await??;
        self.fill(&key, found, deadline).await
    }

    async fn fill(
        &self,
        key: &TenantCacheKey,
        found: Option<TenantInfo>,
        deadline: Deadline,
    ) -> Result<Option<TenantInfo>, TenantLookupError> {
        let Some(info) = found else {
            debug!("tenant not found");
            return Ok(None);
        };

        // The answer is already known; running out of time here only skips the fill.
        if deadline
            .run("tenant_cache.set", self.cache.set(key, &info, self.entry_ttl))
            .await
            .is_err()
        {
            debug!("deadline reached before tenant cache fill");
        }
        Ok(Some(info))
    }
}
