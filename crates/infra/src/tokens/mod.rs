//! Refresh-token lifecycle and access-token revocation.

mod error;

pub mod lifecycle;
pub mod revocation;

pub use error::CredentialError;
pub use lifecycle::{PendingRotation, Rotation, TokenLifecycleService};
pub use revocation::AccessTokenRevocationRegistry;
