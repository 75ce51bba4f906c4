//! Strongly-typed identifiers used across the platform.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a tenant (multi-tenant boundary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

/// Identifier of a user account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of a stored refresh-token record (never the secret itself).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshTokenId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// The nil UUID stands for "no id" at the boundaries that accept
            /// raw identifiers (claims, query strings).
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Reject the nil identifier with a validation error naming the field.
            pub fn ensure_present(self, field: &str) -> Result<Self, DomainError> {
                if self.is_nil() {
                    return Err(DomainError::validation(format!("{field} must not be empty")));
                }
                Ok(self)
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s.trim())
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(TenantId, "TenantId");
impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(RefreshTokenId, "RefreshTokenId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_id_is_rejected_with_field_name() {
        let err = TenantId::from_uuid(Uuid::nil())
            .ensure_present("tenant_id")
            .unwrap_err();
        assert_eq!(err, DomainError::validation("tenant_id must not be empty"));
    }

    #[test]
    fn parse_trims_and_reports_type_name() {
        let id = UserId::new();
        let parsed: UserId = format!("  {id} ").parse().unwrap();
        assert_eq!(parsed, id);

        match "not-a-uuid".parse::<UserId>() {
            Err(DomainError::InvalidId(msg)) => assert!(msg.starts_with("UserId")),
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }
}
