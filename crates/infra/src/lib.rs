//! Infrastructure layer: credential and tenant stores, caches, and the
//! credential-lifecycle services built on top of them.

pub mod config;
pub mod credentials;
pub mod deadline;
pub mod session;
pub mod tenancy;
pub mod tokens;
pub mod users;

mod integration_tests;

pub use config::{AuthConfig, ConfigError, StorageConfig};
pub use deadline::{Deadline, DeadlineExceeded};
pub use session::{
    AuthSessionOrchestrator, ErrorBody, LoginOutcome, LogoutOutcome, RequestContext, SessionError,
};
pub use users::{InMemoryUserDirectory, PostgresUserDirectory, UserDirectory, UserDirectoryError};
