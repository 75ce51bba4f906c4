//! String key-value cache abstraction shared across service instances.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use peoplehub_core::Clock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_string(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

#[async_trait]
impl<S> KeyValueCache for Arc<S>
where
    S: KeyValueCache + ?Sized,
{
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get_string(key).await
    }

    async fn set_string(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        (**self).set_string(key, value, ttl).await
    }
}

/// Process-local cache with per-entry expiry.
///
/// Intended for tests/dev and single-instance deployments.
#[derive(Debug)]
pub struct InMemoryKeyValueCache {
    entries: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryKeyValueCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl KeyValueCache for InMemoryKeyValueCache {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::Unavailable("lock poisoned".to_string()))?;
        let now = self.clock.now();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set_string(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        let expires_at = self.clock.now() + ttl;

        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Unavailable("lock poisoned".to_string()))?;
        entries.retain(|_, (_, at)| *at > self.clock.now());
        entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peoplehub_core::ManualClock;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = InMemoryKeyValueCache::new(clock.clone());

        cache
            .set_string("tenant:id:1", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get_string("tenant:id:1").await.unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(cache.get_string("tenant:id:1").await.unwrap(), None);
    }
}
