//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures raised by pure credential and tenant code.
///
/// Only input problems live here. A record that is expired or already
/// revoked is a state, not an error, and storage failures are reported by
/// the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (blank secret, nil tenant id, bad digest).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
