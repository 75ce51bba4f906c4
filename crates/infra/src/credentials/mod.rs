//! Persistence for refresh tokens and revoked access tokens.

mod store;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;
pub use store::{CommitReceipt, CredentialBatch, CredentialStore, CredentialStoreError, CredentialWrite};
