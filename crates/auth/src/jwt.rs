//! HS256 access-token signing and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::{AccessClaims, Jti, TokenValidationError, UserAccount, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("token could not be verified: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// A freshly signed access token together with the handles callers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedAccessToken {
    pub token: String,
    pub jti: Jti,
    pub expires_at: DateTime<Utc>,
}

impl MintedAccessToken {
    /// Seconds until expiry, never negative.
    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Mints short-lived access tokens.
pub trait AccessTokenSigner: Send + Sync {
    fn mint(
        &self,
        account: &UserAccount,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<MintedAccessToken, JwtError>;
}

/// Verifies access tokens (signature, issuer, audience, time window).
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, JwtError>;
}

/// Symmetric HS256 signer/validator.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl AccessTokenSigner for Hs256Jwt {
    fn mint(
        &self,
        account: &UserAccount,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<MintedAccessToken, JwtError> {
        let expires_at = now + lifetime;
        let claims = AccessClaims {
            sub: account.user_id,
            tenant_id: account.tenant_id,
            username: account.username.clone(),
            jti: Jti::generate(),
            permissions: account.permissions.clone(),
            employee_id: account.employee_id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = self.sign(&claims)?;
        Ok(MintedAccessToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        // The time window is checked against the caller's clock below.
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
