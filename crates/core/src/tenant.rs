//! Tenant directory projection.

use serde::{Deserialize, Serialize};

use crate::{TenantId, ValueObject};

/// Immutable snapshot of a tenant as seen by identification and auth flows.
///
/// Rebuilt from the tenant store on every cache miss and cached as a whole;
/// it carries no back-reference to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub id: TenantId,
    pub name: String,
    pub code: String,
    pub domain: Option<String>,
    pub is_active: bool,
    pub settings: TenantSettings,
}

/// Per-tenant regional and capacity settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub timezone: String,
    pub locale: String,
    pub currency: String,
    pub max_employees: u32,
    pub enable_mfa: bool,
    pub enable_sso: bool,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            locale: "en-US".to_string(),
            currency: "USD".to_string(),
            max_employees: 100,
            enable_mfa: false,
            enable_sso: false,
        }
    }
}

impl ValueObject for TenantInfo {}
impl ValueObject for TenantSettings {}

impl TenantInfo {
    /// True when `identifier` addresses this tenant (by code or by domain).
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.code == identifier || self.domain.as_deref() == Some(identifier)
    }
}
