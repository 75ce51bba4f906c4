//! Refresh secrets and their one-way digests.
//!
//! The raw secret exists only in memory between generation and the response
//! that hands it to the caller. Stores and logs only ever see [`TokenHash`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use peoplehub_core::{DomainError, DomainResult, ValueObject};

/// Number of random bytes in a generated secret (512 bits).
const SECRET_BYTES: usize = 64;

/// Length of a hex-encoded SHA-256 digest.
const HASH_HEX_LEN: usize = 64;

/// Opaque, high-entropy refresh secret as presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshSecret(String);

impl RefreshSecret {
    /// Generate a fresh secret from the OS RNG, URL-safe base64 encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a client-presented secret. Blank input is a validation error.
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::validation("refresh token must not be blank"));
        }
        Ok(Self(raw))
    }

    /// The raw value, for the single response that returns it to the caller.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn hash(&self) -> TokenHash {
        TokenHash::digest(&self.0)
    }
}

impl core::fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("RefreshSecret(<redacted>)")
    }
}

/// Lower-case hex SHA-256 digest of a refresh secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    pub fn digest(raw: &str) -> Self {
        Self(hex::encode(Sha256::digest(raw.as_bytes())))
    }

    /// Rehydrate a stored digest, rejecting anything that is not 64 hex chars.
    pub fn from_hex(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into().trim().to_ascii_lowercase();
        if value.len() != HASH_HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DomainError::validation("token hash must be a 64-char hex digest"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for TokenHash {}
