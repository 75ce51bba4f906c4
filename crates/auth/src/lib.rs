//! `peoplehub-auth`: pure credential model (no IO).
//!
//! Refresh-token and revoked-access-token records, secret hashing, access-token
//! claims and signing. Persistence and orchestration live in `peoplehub-infra`.

mod fields;

pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod refresh_token;
pub mod revoked_access_token;
pub mod secret;

pub use fields::normalize_optional;
pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use jwt::{AccessTokenSigner, Hs256Jwt, JwtError, JwtValidator, MintedAccessToken};
pub use permissions::Permission;
pub use principal::{UserAccount, UserStatus, VerifiedLogin};
pub use refresh_token::{RefreshToken, RefreshTokenRecord, RevokeOutcome};
pub use revoked_access_token::{Jti, RevokedAccessToken};
pub use secret::{RefreshSecret, TokenHash};
