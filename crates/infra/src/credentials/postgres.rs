//! Postgres-backed credential store.
//!
//! Schema: `migrations/0001_credentials.sql`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | CredentialStoreError |
//! |------------|----------------------|----------------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Unavailable` |
//! | Decode / ColumnNotFound | N/A | `Corrupt` |
//! | Other | N/A | `Unavailable` |
//!
//! ## Atomicity
//!
//! `commit` runs the whole batch in one transaction. An error, or dropping the
//! future before `COMMIT` completes, rolls the transaction back when it is
//! dropped. Supersede is a conditional `UPDATE ... WHERE revoked_at IS NULL`;
//! under READ COMMITTED the losing writer re-evaluates the predicate after the
//! winner commits, matches zero rows, and the batch fails as stale.
//!
//! Before any refresh-token write the transaction takes
//! `pg_advisory_xact_lock` on a key derived from every user the batch touches,
//! in ascending key order. Issue, rotation and revoke-all for one user
//! therefore run one after another, and a revoke-all statement starts only
//! after a concurrent rotation has committed, so its snapshot includes the
//! successor token. The locks are released at commit or rollback.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use peoplehub_auth::{Jti, RefreshToken, RefreshTokenRecord, TokenHash};
use peoplehub_core::{Entity, RefreshTokenId, TenantId, UserId};

use super::store::{CommitReceipt, CredentialBatch, CredentialStore, CredentialStoreError, CredentialWrite};

const REFRESH_TOKEN_COLUMNS: &str = r#"
    id, tenant_id, user_id, token_hash, created_at, expires_at, revoked_at,
    replaced_by_token_id, last_used_at, created_by_ip, created_by_user_agent, revoked_by_ip
"#;

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn fetch_one_token(
        &self,
        operation: &'static str,
        predicate: &str,
        bind: Uuid,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        let sql = format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE {predicate}");
        let row = sqlx::query(&sql)
            .bind(bind)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        row.as_ref().map(refresh_token_from_row).transpose()
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip_all, err)]
    async fn find_refresh_token_by_hash(
        &self,
        hash: &TokenHash,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        let sql = format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        let row = sqlx::query(&sql)
            .bind(hash.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_refresh_token_by_hash", e))?;

        row.as_ref().map(refresh_token_from_row).transpose()
    }

    #[instrument(skip(self), fields(token_id = %id), err)]
    async fn find_refresh_token(
        &self,
        id: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        self.fetch_one_token("find_refresh_token", "id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), fields(successor = %successor), err)]
    async fn find_refresh_token_replaced_by(
        &self,
        successor: RefreshTokenId,
    ) -> Result<Option<RefreshToken>, CredentialStoreError> {
        self.fetch_one_token(
            "find_refresh_token_replaced_by",
            "replaced_by_token_id = $1",
            *successor.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn active_refresh_tokens_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, CredentialStoreError> {
        let sql = format!(
            "SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2 \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(now)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("active_refresh_tokens_for_user", e))?;

        rows.iter().map(refresh_token_from_row).collect()
    }

    #[instrument(skip_all, err)]
    async fn is_access_token_revoked(&self, jti: &Jti) -> Result<bool, CredentialStoreError> {
        let row = sqlx::query("SELECT 1 FROM revoked_access_tokens WHERE jti = $1")
            .bind(jti.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("is_access_token_revoked", e))?;
        Ok(row.is_some())
    }

    #[instrument(skip_all, fields(writes = batch.len()), err)]
    async fn commit(&self, batch: CredentialBatch) -> Result<CommitReceipt, CredentialStoreError> {
        let mut receipt = CommitReceipt::default();
        if batch.is_empty() {
            return Ok(receipt);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for key in user_lock_keys(&batch) {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_user_credentials", e))?;
        }

        for write in batch.into_writes() {
            match write {
                CredentialWrite::IssueRefreshToken(token) => {
                    let r = token.to_record();
                    sqlx::query(
                        r#"
                        INSERT INTO refresh_tokens (
                            id, tenant_id, user_id, token_hash, created_at, expires_at, revoked_at,
                            replaced_by_token_id, last_used_at, created_by_ip, created_by_user_agent,
                            revoked_by_ip
                        )
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                        "#,
                    )
                    .bind(r.id.as_uuid())
                    .bind(r.tenant_id.as_uuid())
                    .bind(r.user_id.as_uuid())
                    .bind(r.token_hash.as_str())
                    .bind(r.created_at)
                    .bind(r.expires_at)
                    .bind(r.revoked_at)
                    .bind(r.replaced_by.map(|id| *id.as_uuid()))
                    .bind(r.last_used_at)
                    .bind(r.created_by_ip.as_deref())
                    .bind(r.created_by_user_agent.as_deref())
                    .bind(r.revoked_by_ip.as_deref())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("issue_refresh_token", e))?;
                    receipt.refresh_tokens_issued += 1;
                }
                CredentialWrite::SupersedeRefreshToken(token) => {
                    let r = token.to_record();
                    let result = sqlx::query(
                        r#"
                        UPDATE refresh_tokens
                        SET revoked_at = $2,
                            replaced_by_token_id = $3,
                            last_used_at = $4,
                            revoked_by_ip = $5
                        WHERE id = $1 AND token_hash = $6 AND revoked_at IS NULL
                        "#,
                    )
                    .bind(r.id.as_uuid())
                    .bind(r.revoked_at)
                    .bind(r.replaced_by.map(|id| *id.as_uuid()))
                    .bind(r.last_used_at)
                    .bind(r.revoked_by_ip.as_deref())
                    .bind(r.token_hash.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("supersede_refresh_token", e))?;

                    if result.rows_affected() != 1 {
                        return Err(CredentialStoreError::Stale(format!(
                            "refresh token {} already revoked or missing",
                            token.id()
                        )));
                    }
                    receipt.refresh_tokens_revoked += 1;
                }
                CredentialWrite::RevokeActiveForUser {
                    user_id,
                    revoked_at,
                    ip,
                } => {
                    let result = sqlx::query(
                        r#"
                        UPDATE refresh_tokens
                        SET revoked_at = $2, revoked_by_ip = $3
                        WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2
                        "#,
                    )
                    .bind(user_id.as_uuid())
                    .bind(revoked_at)
                    .bind(ip.as_deref())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("revoke_active_for_user", e))?;
                    receipt.refresh_tokens_revoked += result.rows_affected();
                }
                CredentialWrite::RecordRevokedAccessToken(record) => {
                    let result = sqlx::query(
                        r#"
                        INSERT INTO revoked_access_tokens (
                            jti, tenant_id, user_id, expires_at, revoked_at, revoked_by_ip
                        )
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (jti) DO NOTHING
                        "#,
                    )
                    .bind(record.jti().as_str())
                    .bind(record.tenant_id().as_uuid())
                    .bind(record.user_id().as_uuid())
                    .bind(record.expires_at())
                    .bind(record.revoked_at())
                    .bind(record.revoked_by_ip())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("record_revoked_access_token", e))?;
                    receipt.access_tokens_recorded += result.rows_affected();
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(receipt)
    }

    #[instrument(skip(self), err)]
    async fn prune_revoked_access_tokens(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, CredentialStoreError> {
        let result = sqlx::query("DELETE FROM revoked_access_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("prune_revoked_access_tokens", e))?;
        Ok(result.rows_affected())
    }
}

/// Advisory-lock keys for the users whose refresh tokens `batch` writes,
/// sorted so concurrent batches acquire them in the same order.
fn user_lock_keys(batch: &CredentialBatch) -> Vec<i64> {
    let mut keys: Vec<i64> = batch
        .writes()
        .iter()
        .filter_map(|write| match write {
            CredentialWrite::IssueRefreshToken(token) | CredentialWrite::SupersedeRefreshToken(token) => {
                Some(token.user_id())
            }
            CredentialWrite::RevokeActiveForUser { user_id, .. } => Some(*user_id),
            CredentialWrite::RecordRevokedAccessToken(_) => None,
        })
        .map(advisory_lock_key)
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Fold the user id into the 64-bit key space. Collisions only serialize
/// unrelated users.
fn advisory_lock_key(user_id: UserId) -> i64 {
    let bits = user_id.as_uuid().as_u128();
    ((bits >> 64) as u64 ^ bits as u64) as i64
}

fn refresh_token_from_row(row: &PgRow) -> Result<RefreshToken, CredentialStoreError> {
    let corrupt = |e: sqlx::Error| CredentialStoreError::Corrupt(format!("refresh_tokens row: {e}"));

    let token_hash: String = row.try_get("token_hash").map_err(corrupt)?;
    let token_hash =
        TokenHash::from_hex(token_hash).map_err(|e| CredentialStoreError::Corrupt(e.to_string()))?;
    let replaced_by: Option<Uuid> = row.try_get("replaced_by_token_id").map_err(corrupt)?;

    Ok(RefreshToken::from_record(RefreshTokenRecord {
        id: RefreshTokenId::from_uuid(row.try_get("id").map_err(corrupt)?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(corrupt)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(corrupt)?),
        token_hash,
        created_at: row.try_get("created_at").map_err(corrupt)?,
        expires_at: row.try_get("expires_at").map_err(corrupt)?,
        revoked_at: row.try_get("revoked_at").map_err(corrupt)?,
        replaced_by: replaced_by.map(RefreshTokenId::from_uuid),
        last_used_at: row.try_get("last_used_at").map_err(corrupt)?,
        created_by_ip: row.try_get("created_by_ip").map_err(corrupt)?,
        created_by_user_agent: row.try_get("created_by_user_agent").map_err(corrupt)?,
        revoked_by_ip: row.try_get("revoked_by_ip").map_err(corrupt)?,
    }))
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CredentialStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => CredentialStoreError::Conflict(msg),
                _ => CredentialStoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            CredentialStoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        _ => CredentialStoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
