use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use peoplehub_core::{TenantId, TenantInfo};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantDirectoryError {
    #[error("tenant store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt tenant record: {0}")]
    Corrupt(String),
}

/// Tenant store of record.
///
/// Both lookups bypass tenant scoping because they run before any tenant
/// context exists. This trait is the only place that happens; tenant-scoped
/// reads belong elsewhere.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Tenant whose code or domain equals `identifier`.
    async fn find_by_identifier_unscoped(
        &self,
        identifier: &str,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError>;

    async fn find_by_id_unscoped(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError>;
}

#[async_trait]
impl<S> TenantDirectory for Arc<S>
where
    S: TenantDirectory + ?Sized,
{
    async fn find_by_identifier_unscoped(
        &self,
        identifier: &str,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError> {
        (**self).find_by_identifier_unscoped(identifier).await
    }

    async fn find_by_id_unscoped(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError> {
        (**self).find_by_id_unscoped(tenant_id).await
    }
}

/// In-memory tenant directory.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<HashMap<TenantId, TenantInfo>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, tenant: TenantInfo) -> Result<(), TenantDirectoryError> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| TenantDirectoryError::Unavailable("lock poisoned".to_string()))?;
        tenants.insert(tenant.id, tenant);
        Ok(())
    }

    pub fn remove(&self, tenant_id: TenantId) -> Result<Option<TenantInfo>, TenantDirectoryError> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| TenantDirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(tenants.remove(&tenant_id))
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_by_identifier_unscoped(
        &self,
        identifier: &str,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| TenantDirectoryError::Unavailable("lock poisoned".to_string()))?;
        // A code match wins over a domain match.
        let by_code = tenants.values().find(|t| t.code == identifier);
        Ok(by_code
            .or_else(|| tenants.values().find(|t| t.matches_identifier(identifier)))
            .cloned())
    }

    async fn find_by_id_unscoped(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| TenantDirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(tenants.get(&tenant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peoplehub_core::TenantSettings;

    fn tenant(code: &str, domain: Option<&str>) -> TenantInfo {
        TenantInfo {
            id: TenantId::new(),
            name: code.to_string(),
            code: code.to_string(),
            domain: domain.map(str::to_string),
            is_active: true,
            settings: TenantSettings::default(),
        }
    }

    #[tokio::test]
    async fn code_match_is_preferred_over_domain_match() {
        let directory = InMemoryTenantDirectory::new();
        let by_domain = tenant("globex", Some("acme"));
        let by_code = tenant("acme", None);
        directory.upsert(by_domain.clone()).unwrap();
        directory.upsert(by_code.clone()).unwrap();

        for _ in 0..16 {
            let found = directory.find_by_identifier_unscoped("acme").await.unwrap();
            assert_eq!(found.map(|t| t.id), Some(by_code.id));
        }
        let found = directory.find_by_identifier_unscoped("globex").await.unwrap();
        assert_eq!(found.map(|t| t.id), Some(by_domain.id));
    }

    #[tokio::test]
    async fn unknown_identifier_and_removed_tenant_are_absent() {
        let directory = InMemoryTenantDirectory::new();
        let t = tenant("initech", Some("initech.example.com"));
        directory.upsert(t.clone()).unwrap();

        assert_eq!(directory.find_by_identifier_unscoped("umbrella").await.unwrap(), None);
        assert_eq!(
            directory.find_by_identifier_unscoped("initech.example.com").await.unwrap(),
            Some(t.clone())
        );
        directory.remove(t.id).unwrap();
        assert_eq!(directory.find_by_id_unscoped(t.id).await.unwrap(), None);
    }
}
