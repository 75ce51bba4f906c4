//! Postgres-backed tenant directory (`tenants` table).

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use peoplehub_core::{TenantId, TenantInfo, TenantSettings};

use super::directory::{TenantDirectory, TenantDirectoryError};

const TENANT_COLUMNS: &str = r#"
    id, name, code, domain, status, timezone, locale, currency,
    max_employees, enable_mfa, enable_sso
"#;

#[derive(Debug, Clone)]
pub struct PostgresTenantDirectory {
    pool: Arc<PgPool>,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    #[instrument(skip(self), err)]
    async fn find_by_identifier_unscoped(
        &self,
        identifier: &str,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError> {
        let sql = format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE code = $1 OR domain = $1 \
             ORDER BY (code = $1) DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_identifier", e))?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn find_by_id_unscoped(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<TenantInfo>, TenantDirectoryError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(tenant_from_row).transpose()
    }
}

fn tenant_from_row(row: &PgRow) -> Result<TenantInfo, TenantDirectoryError> {
    let corrupt = |e: sqlx::Error| TenantDirectoryError::Corrupt(format!("tenants row: {e}"));

    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let status: String = row.try_get("status").map_err(corrupt)?;
    let max_employees: i32 = row.try_get("max_employees").map_err(corrupt)?;
    let max_employees = u32::try_from(max_employees)
        .map_err(|_| TenantDirectoryError::Corrupt(format!("negative max_employees for tenant {id}")))?;

    Ok(TenantInfo {
        id: TenantId::from_uuid(id),
        name: row.try_get("name").map_err(corrupt)?,
        code: row.try_get("code").map_err(corrupt)?,
        domain: row.try_get("domain").map_err(corrupt)?,
        is_active: status.eq_ignore_ascii_case("active"),
        settings: TenantSettings {
            timezone: row.try_get("timezone").map_err(corrupt)?,
            locale: row.try_get("locale").map_err(corrupt)?,
            currency: row.try_get("currency").map_err(corrupt)?,
            max_employees,
            enable_mfa: row.try_get("enable_mfa").map_err(corrupt)?,
            enable_sso: row.try_get("enable_sso").map_err(corrupt)?,
        },
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> TenantDirectoryError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            TenantDirectoryError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        _ => TenantDirectoryError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
