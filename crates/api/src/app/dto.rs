use serde::{Deserialize, Serialize};

use peoplehub_core::TenantInfo;

use crate::context::PrincipalContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub tenant_id: String,
    pub username: String,
    pub permissions: Vec<String>,
    pub employee_id: Option<String>,
    pub expires_at: String,
}

impl From<&PrincipalContext> for MeResponse {
    fn from(principal: &PrincipalContext) -> Self {
        let claims = principal.claims();
        Self {
            user_id: principal.user_id().to_string(),
            tenant_id: claims.tenant_id.to_string(),
            username: principal.username().to_string(),
            permissions: principal
                .permissions()
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            employee_id: claims.employee_id.map(|id| id.to_string()),
            expires_at: principal.expires_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantResponse {
    pub id: String,
    pub name: String,
    pub code: String,
    pub domain: Option<String>,
    pub is_active: bool,
    pub timezone: String,
    pub locale: String,
    pub currency: String,
    pub max_employees: u32,
    pub enable_mfa: bool,
    pub enable_sso: bool,
}

impl From<TenantInfo> for TenantResponse {
    fn from(t: TenantInfo) -> Self {
        Self {
            id: t.id.to_string(),
            name: t.name,
            code: t.code,
            domain: t.domain,
            is_active: t.is_active,
            timezone: t.settings.timezone,
            locale: t.settings.locale,
            currency: t.settings.currency,
            max_employees: t.settings.max_employees,
            enable_mfa: t.settings.enable_mfa,
            enable_sso: t.settings.enable_sso,
        }
    }
}
