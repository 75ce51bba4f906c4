//! Environment-driven configuration.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    NotAPositiveInteger { key: &'static str, value: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

/// Token lifetimes, JWT identity and tenant-cache tuning.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// `None` when `JWT_SECRET` is unset; the binary decides the fallback.
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub tenant_cache_ttl: Duration,
    pub tenant_cache_disable_window: Duration,
    pub tenant_cache_op_timeout: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("tenant_cache_ttl", &self.tenant_cache_ttl)
            .field("tenant_cache_disable_window", &self.tenant_cache_disable_window)
            .field("tenant_cache_op_timeout", &self.tenant_cache_op_timeout)
            .finish()
    }
}

const MINUTE: u64 = 60;
const DAY: u64 = 24 * 60 * MINUTE;

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_issuer: "peoplehub".to_string(),
            jwt_audience: "peoplehub-api".to_string(),
            access_token_lifetime: Duration::from_secs(120 * MINUTE),
            refresh_token_lifetime: Duration::from_secs(14 * DAY),
            tenant_cache_ttl: Duration::from_secs(30 * MINUTE),
            tenant_cache_disable_window: Duration::from_secs(2 * MINUTE),
            tenant_cache_op_timeout: Duration::from_millis(500),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let access_secs = clamped_secs(get("ACCESS_TOKEN_MINUTES"), "ACCESS_TOKEN_MINUTES", 120, MINUTE)?;
        let refresh_secs = clamped_secs(get("REFRESH_TOKEN_DAYS"), "REFRESH_TOKEN_DAYS", 14, DAY)?;

        Ok(Self {
            jwt_secret: get("JWT_SECRET"),
            jwt_issuer: get("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: get("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            access_token_lifetime: Duration::from_secs(access_secs),
            refresh_token_lifetime: Duration::from_secs(refresh_secs),
            tenant_cache_ttl: Duration::from_secs(positive(
                get("TENANT_CACHE_TTL_SECS"),
                "TENANT_CACHE_TTL_SECS",
                1800,
            )?),
            tenant_cache_disable_window: Duration::from_secs(positive(
                get("TENANT_CACHE_DISABLE_SECS"),
                "TENANT_CACHE_DISABLE_SECS",
                120,
            )?),
            tenant_cache_op_timeout: Duration::from_millis(positive(
                get("TENANT_CACHE_OP_TIMEOUT_MS"),
                "TENANT_CACHE_OP_TIMEOUT_MS",
                500,
            )?),
        })
    }

    /// Secret for HS256 signing, rejecting a configured-but-blank value.
    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Empty { key: "JWT_SECRET" })
    }

    pub fn access_token_lifetime_chrono(&self) -> chrono::Duration {
        to_chrono(self.access_token_lifetime)
    }

    pub fn refresh_token_lifetime_chrono(&self) -> chrono::Duration {
        to_chrono(self.refresh_token_lifetime)
    }
}

/// Backing-service locations. Absent means in-memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL").filter(|v| !v.eq_ignore_ascii_case("disabled")),
        }
    }
}

fn parse(raw: &str, key: &'static str) -> Result<i64, ConfigError> {
    raw.parse::<i64>().map_err(|_| ConfigError::NotAPositiveInteger {
        key,
        value: raw.to_string(),
    })
}

/// Count of `unit`-second periods as seconds. Values below one are raised to one.
fn clamped_secs(raw: Option<String>, key: &'static str, default: u64, unit: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default * unit);
    };
    let count = parse(&raw, key)?.max(1) as u64;
    count
        .checked_mul(unit)
        .ok_or(ConfigError::NotAPositiveInteger { key, value: raw })
}

fn positive(raw: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => match parse(&raw, key)? {
            n if n >= 1 => Ok(n as u64),
            _ => Err(ConfigError::NotAPositiveInteger { key, value: raw }),
        },
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AuthConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, AuthConfig::default());
        assert_eq!(cfg.access_token_lifetime, Duration::from_secs(7200));
        assert_eq!(cfg.refresh_token_lifetime_chrono(), chrono::Duration::days(14));
        assert!(cfg.require_jwt_secret().is_err());
    }

    #[test]
    fn lifetimes_too_large_to_represent_are_rejected() {
        let err = AuthConfig::from_lookup(lookup(&[("REFRESH_TOKEN_DAYS", "1000000000000000")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotAPositiveInteger {
                key: "REFRESH_TOKEN_DAYS",
                value: "1000000000000000".to_string(),
            }
        );

        let huge = i64::MAX.to_string();
        let err = AuthConfig::from_lookup(lookup(&[("ACCESS_TOKEN_MINUTES", huge.as_str())])).unwrap_err();
        assert!(matches!(err, ConfigError::NotAPositiveInteger { key: "ACCESS_TOKEN_MINUTES", .. }));
    }

    #[test]
    fn lifetimes_below_one_are_clamped() {
        let cfg = AuthConfig::from_lookup(lookup(&[
            ("REFRESH_TOKEN_DAYS", "0"),
            ("ACCESS_TOKEN_MINUTES", "-5"),
        ]))
        .unwrap();
        assert_eq!(cfg.refresh_token_lifetime_chrono(), chrono::Duration::days(1));
        assert_eq!(cfg.access_token_lifetime_chrono(), chrono::Duration::minutes(1));
    }

    #[test]
    fn garbage_and_non_positive_cache_values_are_rejected() {
        let err = AuthConfig::from_lookup(lookup(&[("ACCESS_TOKEN_MINUTES", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotAPositiveInteger {
                key: "ACCESS_TOKEN_MINUTES",
                value: "soon".to_string()
            }
        );
        assert!(AuthConfig::from_lookup(lookup(&[("TENANT_CACHE_OP_TIMEOUT_MS", "0")])).is_err());
    }

    #[test]
    fn secret_is_redacted_in_debug_output() {
        let cfg = AuthConfig::from_lookup(lookup(&[("JWT_SECRET", "hunter2")])).unwrap();
        assert_eq!(cfg.require_jwt_secret(), Ok("hunter2"));
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    #[test]
    fn disabled_redis_means_in_memory() {
        let storage = StorageConfig::from_lookup(lookup(&[
            ("REDIS_URL", "disabled"),
            ("DATABASE_URL", "postgres://localhost/peoplehub"),
        ]));
        assert_eq!(storage.redis_url, None);
        assert_eq!(storage.database_url.as_deref(), Some("postgres://localhost/peoplehub"));
    }
}
