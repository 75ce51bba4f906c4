use thiserror::Error;

use peoplehub_core::DomainError;

use crate::credentials::CredentialStoreError;
use crate::deadline::DeadlineExceeded;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown, revoked or expired. Callers never learn which.
    #[error("invalid credential")]
    InvalidCredential,

    #[error(transparent)]
    Store(#[from] CredentialStoreError),

    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),
}

impl From<DomainError> for CredentialError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
        }
    }
}
