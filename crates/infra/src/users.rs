//! Read access to user accounts for session checks.
//!
//! Account management (passwords, roles, MFA enrollment) lives outside this
//! crate. Refresh only needs to know whether the account still exists and may
//! authenticate, plus the claims to put in the new access token.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use peoplehub_auth::{Permission, UserAccount, UserStatus};
use peoplehub_core::{TenantId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserDirectoryError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt user record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_account(&self, user_id: UserId) -> Result<Option<UserAccount>, UserDirectoryError>;
}

#[async_trait]
impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    async fn find_account(&self, user_id: UserId) -> Result<Option<UserAccount>, UserDirectoryError> {
        (**self).find_account(user_id).await
    }
}

/// In-memory user directory.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    accounts: RwLock<HashMap<UserId, UserAccount>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, account: UserAccount) -> Result<(), UserDirectoryError> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| UserDirectoryError::Unavailable("lock poisoned".to_string()))?;
        accounts.insert(account.user_id, account);
        Ok(())
    }

    /// Returns false if the account does not exist.
    pub fn set_status(&self, user_id: UserId, status: UserStatus) -> Result<bool, UserDirectoryError> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| UserDirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(accounts
            .get_mut(&user_id)
            .map(|account| account.status = status)
            .is_some())
    }

    pub fn remove(&self, user_id: UserId) -> Result<Option<UserAccount>, UserDirectoryError> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| UserDirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(accounts.remove(&user_id))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_account(&self, user_id: UserId) -> Result<Option<UserAccount>, UserDirectoryError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| UserDirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(accounts.get(&user_id).cloned())
    }
}

/// Postgres-backed user directory (`users` table, read-only).
#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn find_account(&self, user_id: UserId) -> Result<Option<UserAccount>, UserDirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, username, status, permissions, employee_id
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| UserDirectoryError::Unavailable(format!("sqlx error in find_account: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let corrupt = |e: sqlx::Error| UserDirectoryError::Corrupt(format!("users row: {e}"));

        let id: Uuid = row.try_get("id").map_err(corrupt)?;
        let tenant_id: Uuid = row.try_get("tenant_id").map_err(corrupt)?;
        let status: String = row.try_get("status").map_err(corrupt)?;
        let permissions: Vec<String> = row.try_get("permissions").map_err(corrupt)?;

        Ok(Some(UserAccount {
            user_id: UserId::from_uuid(id),
            tenant_id: TenantId::from_uuid(tenant_id),
            username: row.try_get("username").map_err(corrupt)?,
            status: if status.eq_ignore_ascii_case("active") {
                UserStatus::Active
            } else {
                UserStatus::Suspended
            },
            permissions: permissions.into_iter().map(Permission::new).collect(),
            employee_id: row.try_get("employee_id").map_err(corrupt)?,
        }))
    }
}
