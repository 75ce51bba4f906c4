//! `peoplehub-core`: shared building blocks for the HR platform.
//!
//! This crate contains **pure** primitives (no infrastructure concerns): typed
//! identifiers, the domain error model, the tenant directory projection and
//! the clock abstraction every time-dependent component reads from.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod tenant;
pub mod value_object;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{RefreshTokenId, TenantId, UserId};
pub use tenant::{TenantInfo, TenantSettings};
pub use value_object::ValueObject;
