//! Tenant identification: store of record, shared cache and the resolver
//! that combines them.

pub mod cache;
pub mod directory;
pub mod kv;
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_cache;
pub mod resolver;

pub use cache::{TenantCacheKey, TenantDirectoryCache};
pub use directory::{InMemoryTenantDirectory, TenantDirectory, TenantDirectoryError};
pub use kv::{CacheError, InMemoryKeyValueCache, KeyValueCache};
pub use postgres::PostgresTenantDirectory;
pub use resolver::{TenantLookupError, TenantResolver};
#[cfg(feature = "redis")]
pub use redis_cache::RedisKeyValueCache;
