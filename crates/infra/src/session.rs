//! Login, refresh and logout use cases.
//!
//! The orchestrator is the only entry point an HTTP layer needs. It composes
//! the token lifecycle, the access-token revocation registry, the tenant
//! resolver and the user directory, and maps their failures onto
//! [`SessionError`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use peoplehub_auth::{
    AccessClaims, AccessTokenSigner, JwtError, Jti, MintedAccessToken, RefreshSecret, UserAccount,
    VerifiedLogin,
};
use peoplehub_core::{Clock, TenantId, TenantInfo, UserId};

use crate::credentials::{CredentialBatch, CredentialStoreError};
use crate::deadline::{Deadline, DeadlineExceeded};
use crate::tenancy::{TenantDirectoryError, TenantLookupError, TenantResolver};
use crate::tokens::{AccessTokenRevocationRegistry, CredentialError, TokenLifecycleService};
use crate::users::{UserDirectory, UserDirectoryError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Same message for unknown, expired, revoked and disabled-user cases.
    #[error("refresh token is invalid or expired")]
    InvalidCredential,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("tenant is unknown or inactive")]
    TenantUnavailable,

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Structured failure shape returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidCredential => "INVALID_REFRESH_TOKEN",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::TenantUnavailable => "TENANT_UNAVAILABLE",
            Self::Unavailable(_) | Self::DeadlineExceeded(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Caller-facing body. Infrastructure detail stays in the logs.
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            Self::Validation(msg) => msg.clone(),
            Self::Unavailable(_) | Self::DeadlineExceeded(_) => {
                "service temporarily unavailable; retry the request".to_string()
            }
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            code: self.code(),
            message,
        }
    }
}

impl From<CredentialError> for SessionError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Validation(msg) => Self::Validation(msg),
            CredentialError::InvalidCredential => Self::InvalidCredential,
            CredentialError::Store(CredentialStoreError::Unavailable(msg)) => Self::Unavailable(msg),
            CredentialError::Store(other) => Self::Internal(other.to_string()),
            CredentialError::DeadlineExceeded(d) => Self::DeadlineExceeded(d.operation),
        }
    }
}

impl From<TenantLookupError> for SessionError {
    fn from(err: TenantLookupError) -> Self {
        match err {
            TenantLookupError::Validation(msg) => Self::Validation(msg),
            TenantLookupError::Directory(TenantDirectoryError::Unavailable(msg)) => Self::Unavailable(msg),
            TenantLookupError::Directory(other) => Self::Internal(other.to_string()),
            TenantLookupError::DeadlineExceeded(d) => Self::DeadlineExceeded(d.operation),
        }
    }
}

impl From<UserDirectoryError> for SessionError {
    fn from(err: UserDirectoryError) -> Self {
        match err {
            UserDirectoryError::Unavailable(msg) => Self::Unavailable(msg),
            UserDirectoryError::Corrupt(msg) => Self::Internal(msg),
        }
    }
}

impl From<JwtError> for SessionError {
    fn from(err: JwtError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<DeadlineExceeded> for SessionError {
    fn from(err: DeadlineExceeded) -> Self {
        Self::DeadlineExceeded(err.operation)
    }
}

/// Per-request metadata recorded on credential records.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub deadline: Deadline,
}

impl RequestContext {
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

/// Result of login and refresh.
///
/// Tokens are absent while a second factor is outstanding.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: i64,
    pub user_id: UserId,
    pub user_name: String,
    pub requires_mfa: bool,
}

impl std::fmt::Debug for LoginOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("LoginOutcome")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expires_in_seconds", &self.expires_in_seconds)
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("requires_mfa", &self.requires_mfa)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOutcome {
    pub refresh_tokens_revoked: u64,
    /// False when the access token had already been revoked.
    pub access_token_recorded: bool,
}

pub struct AuthSessionOrchestrator {
    tokens: TokenLifecycleService,
    revocations: AccessTokenRevocationRegistry,
    tenants: TenantResolver,
    users: Arc<dyn UserDirectory>,
    signer: Arc<dyn AccessTokenSigner>,
    clock: Arc<dyn Clock>,
    access_lifetime: Duration,
}

impl AuthSessionOrchestrator {
    /// `access_lifetime` is clamped to at least one minute.
    pub fn new(
        tokens: TokenLifecycleService,
        revocations: AccessTokenRevocationRegistry,
        tenants: TenantResolver,
        users: Arc<dyn UserDirectory>,
        signer: Arc<dyn AccessTokenSigner>,
        clock: Arc<dyn Clock>,
        access_lifetime: Duration,
    ) -> Self {
        Self {
            tokens,
            revocations,
            tenants,
            users,
            signer,
            clock,
            access_lifetime: access_lifetime.max(Duration::minutes(1)),
        }
    }

    pub fn tokens(&self) -> &TokenLifecycleService {
        &self.tokens
    }

    pub fn revocations(&self) -> &AccessTokenRevocationRegistry {
        &self.revocations
    }

    pub fn tenants(&self) -> &TenantResolver {
        &self.tenants
    }

    /// Start a session for an account the external authentication step verified.
    #[instrument(
        skip_all,
        fields(user_id = %verified.account.user_id, tenant_id = %verified.account.tenant_id),
        err
    )]
    pub async fn login(
        &self,
        verified: VerifiedLogin,
        ctx: &RequestContext,
    ) -> Result<LoginOutcome, SessionError> {
        let VerifiedLogin {
            account,
            requires_mfa,
        } = verified;

        if !account.can_authenticate() {
            return Err(SessionError::AccountDisabled);
        }
        if self.active_tenant(account.tenant_id, ctx.deadline).await?.is_none() {
            return Err(SessionError::TenantUnavailable);
        }

        if requires_mfa {
            debug!("second factor outstanding; no tokens minted");
            return Ok(LoginOutcome {
                access_token: None,
                refresh_token: None,
                expires_in_seconds: 0,
                user_id: account.user_id,
                user_name: account.username,
                requires_mfa: true,
            });
        }

        let (access, now) = self.mint(&account)?;
        let (_, secret) = self
            .tokens
            .issue_for_session(
                account.tenant_id,
                account.user_id,
                ctx.ip(),
                ctx.user_agent(),
                ctx.deadline,
            )
            .await?;

        info!("session started");
        Ok(Self::outcome(account, access, now, secret))
    }

    /// Rotate a presented refresh secret and mint a new access token.
    #[instrument(skip_all, err)]
    pub async fn refresh(
        &self,
        presented: &str,
        ctx: &RequestContext,
    ) -> Result<LoginOutcome, SessionError> {
        let presented = RefreshSecret::parse(presented)
            .map_err(|_| SessionError::Validation("refresh token is required".to_string()))?;

        let pending = self.tokens.prepare_rotation(&presented, ctx.deadline).await?;

        let account = ctx
            .deadline
            .run("user_directory.find_account", self.users.find_account(pending.user_id()))
            .await??;
        let account = match account {
            Some(a) if a.can_authenticate() && a.tenant_id == pending.tenant_id() => a,
            _ => {
                debug!(user_id = %pending.user_id(), "refresh rejected: account missing or disabled");
                return Err(SessionError::InvalidCredential);
            }
        };

        if self.active_tenant(pending.tenant_id(), ctx.deadline).await?.is_none() {
            debug!(tenant_id = %pending.tenant_id(), "refresh rejected: tenant unavailable");
            return Err(SessionError::InvalidCredential);
        }

        // Mint before committing so a signing failure leaves the presented token usable.
        let (access, now) = self.mint(&account)?;
        let rotation = self
            .tokens
            .commit_rotation(pending, ctx.ip(), ctx.user_agent(), ctx.deadline)
            .await?;

        debug!("session refreshed");
        Ok(Self::outcome(account, access, now, rotation.secret))
    }

    /// End every session of the caller and block the presented access token.
    ///
    /// Both revocations commit as one unit. Retrying after a failure is safe.
    #[instrument(skip_all, fields(user_id = %claims.sub), err)]
    pub async fn logout(
        &self,
        claims: &AccessClaims,
        ctx: &RequestContext,
    ) -> Result<LogoutOutcome, SessionError> {
        let mut batch = CredentialBatch::new();
        self.revocations.stage_revoke(
            &mut batch,
            claims.tenant_id,
            claims.sub,
            claims.jti.clone(),
            claims.expires_at(),
            ctx.ip(),
        )?;
        self.tokens
            .stage_revoke_all_for_user(&mut batch, claims.sub, ctx.ip())?;

        let receipt = self.tokens.commit(batch, ctx.deadline).await?;
        let outcome = LogoutOutcome {
            refresh_tokens_revoked: receipt.refresh_tokens_revoked,
            access_token_recorded: receipt.access_tokens_recorded > 0,
        };
        info!(
            refresh_tokens_revoked = outcome.refresh_tokens_revoked,
            access_token_recorded = outcome.access_token_recorded,
            "session ended"
        );
        Ok(outcome)
    }

    pub async fn is_access_token_revoked(
        &self,
        jti: &Jti,
        deadline: Deadline,
    ) -> Result<bool, SessionError> {
        Ok(self.revocations.is_revoked(jti, deadline).await?)
    }

    pub async fn resolve_tenant(
        &self,
        identifier: &str,
        deadline: Deadline,
    ) -> Result<Option<TenantInfo>, SessionError> {
        Ok(self.tenants.resolve_by_identifier(identifier, deadline).await?)
    }

    async fn active_tenant(
        &self,
        tenant_id: TenantId,
        deadline: Deadline,
    ) -> Result<Option<TenantInfo>, SessionError> {
        Ok(self
            .tenants
            .resolve_by_id(tenant_id, deadline)
            .await?
            .filter(|t| t.is_active))
    }

    fn mint(&self, account: &UserAccount) -> Result<(MintedAccessToken, DateTime<Utc>), SessionError> {
        let now = self.clock.now();
        Ok((self.signer.mint(account, now, self.access_lifetime)?, now))
    }

    fn outcome(
        account: UserAccount,
        access: MintedAccessToken,
        now: DateTime<Utc>,
        refresh: RefreshSecret,
    ) -> LoginOutcome {
        LoginOutcome {
            expires_in_seconds: access.expires_in_seconds(now),
            access_token: Some(access.token),
            refresh_token: Some(refresh.into_inner()),
            user_id: account.user_id,
            user_name: account.username,
            requires_mfa: false,
        }
    }
}
