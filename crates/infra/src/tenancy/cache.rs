//! Shared tenant cache with a time-based skip window.
//!
//! A failing cache must never fail a tenant lookup. Any backend error or
//! timeout turns into a miss and suspends cache use for a fixed window, after
//! which the next call tries the backend again. The window is per instance
//! and is reset, not extended, by each new failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use peoplehub_core::{Clock, TenantId, TenantInfo};

use super::kv::KeyValueCache;

pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_DISABLE_WINDOW: Duration = Duration::from_secs(2 * 60);
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

/// Cache key namespaces. Identifier and id entries for the same tenant are
/// independent; either may be present without the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantCacheKey {
    Identifier(String),
    Id(TenantId),
}

impl TenantCacheKey {
    pub fn render(&self) -> String {
        match self {
            Self::Identifier(identifier) => format!("tenant:identifier:{identifier}"),
            Self::Id(id) => format!("tenant:id:{id}"),
        }
    }
}

pub struct TenantDirectoryCache {
    backend: Arc<dyn KeyValueCache>,
    clock: Arc<dyn Clock>,
    disable_window: Duration,
    op_timeout: Duration,
    /// Unix millis until which the backend is skipped.
    disabled_until_ms: AtomicI64,
}

impl std::fmt::Debug for TenantDirectoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantDirectoryCache")
            .field("disable_window", &self.disable_window)
            .field("op_timeout", &self.op_timeout)
            .field("disabled_until", &self.disabled_until())
            .finish_non_exhaustive()
    }
}

impl TenantDirectoryCache {
    pub fn new(backend: Arc<dyn KeyValueCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            disable_window: DEFAULT_DISABLE_WINDOW,
            op_timeout: DEFAULT_OP_TIMEOUT,
            disabled_until_ms: AtomicI64::new(i64::MIN),
        }
    }

    pub fn with_disable_window(mut self, window: Duration) -> Self {
        self.disable_window = window;
        self
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// False while inside a skip window.
    pub fn is_available(&self) -> bool {
        self.clock.now().timestamp_millis() >= self.disabled_until_ms.load(Ordering::Acquire)
    }

    pub fn disabled_until(&self) -> Option<DateTime<Utc>> {
        let until = self.disabled_until_ms.load(Ordering::Acquire);
        if until == i64::MIN {
            return None;
        }
        DateTime::from_timestamp_millis(until)
    }

    /// Suspend cache use for `window` from now.
    pub fn disable_for(&self, window: Duration) {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let until = self
            .clock
            .now()
            .timestamp_millis()
            .saturating_add(window_ms);
        self.disabled_until_ms.swap(until, Ordering::AcqRel);
    }

    fn trip(&self, operation: &'static str, reason: &str) {
        self.disable_for(self.disable_window);
        warn!(
            operation,
            reason,
            disable_secs = self.disable_window.as_secs(),
            "tenant cache failed; skipping cache"
        );
    }

    /// Cached snapshot for `key`, or `None` on miss, skip or failure.
    pub async fn get(&self, key: &TenantCacheKey) -> Option<TenantInfo> {
        if !self.is_available() {
            debug!("tenant cache disabled; skipping get");
            return None;
        }

        let rendered = key.render();
        let raw = match tokio::time::timeout(self.op_timeout, self.backend.get_string(&rendered)).await {
            Ok(Ok(raw)) => raw?,
            Ok(Err(e)) => {
                self.trip("get", &e.to_string());
                return None;
            }
            Err(_) => {
                self.trip("get", "timed out");
                return None;
            }
        };

        match serde_json::from_str::<TenantInfo>(&raw) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(key = %rendered, "undecodable tenant cache entry");
                self.trip("decode", &e.to_string());
                None
            }
        }
    }

    /// Store `value` under `key`. Failures are logged and swallowed.
    pub async fn set(&self, key: &TenantCacheKey, value: &TenantInfo, ttl: Duration) {
        if !self.is_available() {
            debug!("tenant cache disabled; skipping set");
            return;
        }

        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "failed to encode tenant cache entry");
                return;
            }
        };

        let rendered = key.render();
        match tokio::time::timeout(self.op_timeout, self.backend.set_string(&rendered, encoded, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.trip("set", &e.to_string()),
            Err(_) => self.trip("set", "timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::kv::{CacheError, InMemoryKeyValueCache};
    use async_trait::async_trait;
    use peoplehub_core::{ManualClock, TenantSettings};
    use std::sync::atomic::AtomicUsize;

    /// Counts calls and fails every one of them.
    #[derive(Debug, Default)]
    struct FailingCache {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueCache for FailingCache {
        async fn get_string(&self, _key: &str) -> Result<Option<String>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set_string(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    /// Never answers.
    #[derive(Debug, Default)]
    struct HangingCache;

    #[async_trait]
    impl KeyValueCache for HangingCache {
        async fn get_string(&self, _key: &str) -> Result<Option<String>, CacheError> {
            std::future::pending().await
        }

        async fn set_string(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            std::future::pending().await
        }
    }

    fn tenant() -> TenantInfo {
        TenantInfo {
            id: TenantId::new(),
            name: "Acme".to_string(),
            code: "acme".to_string(),
            domain: None,
            is_active: true,
            settings: TenantSettings::default(),
        }
    }

    #[test]
    fn keys_use_separate_namespaces() {
        let id = TenantId::new();
        assert_eq!(
            TenantCacheKey::Identifier("acme".to_string()).render(),
            "tenant:identifier:acme"
        );
        assert_eq!(TenantCacheKey::Id(id).render(), format!("tenant:id:{id}"));
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_backend() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = TenantDirectoryCache::new(Arc::new(InMemoryKeyValueCache::new(clock.clone())), clock);
        let t = tenant();
        let key = TenantCacheKey::Id(t.id);

        assert_eq!(cache.get(&key).await, None);
        cache.set(&key, &t, DEFAULT_ENTRY_TTL).await;
        assert_eq!(cache.get(&key).await, Some(t));
    }

    #[tokio::test]
    async fn failure_opens_skip_window_then_retries_after_it() {
        let clock = Arc::new(ManualClock::starting_now());
        let backend = Arc::new(FailingCache::default());
        let cache = TenantDirectoryCache::new(backend.clone(), clock.clone());
        let key = TenantCacheKey::Identifier("acme".to_string());

        assert_eq!(cache.get(&key).await, None);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_available());

        // inside the window nothing reaches the backend
        clock.advance(chrono::Duration::seconds(119));
        assert_eq!(cache.get(&key).await, None);
        cache.set(&key, &tenant(), DEFAULT_ENTRY_TTL).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        clock.advance(chrono::Duration::seconds(1));
        assert!(cache.is_available());
        assert_eq!(cache.get(&key).await, None);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn new_failure_resets_the_window() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = TenantDirectoryCache::new(Arc::new(FailingCache::default()), clock.clone());
        let start = clock.now();

        cache.disable_for(Duration::from_secs(120));
        clock.advance(chrono::Duration::seconds(120));
        cache.get(&TenantCacheKey::Id(TenantId::new())).await;

        let until = cache.disabled_until().unwrap();
        assert_eq!(until, start + chrono::Duration::seconds(240));
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = TenantDirectoryCache::new(Arc::new(HangingCache), clock)
            .with_op_timeout(Duration::from_millis(20));

        assert_eq!(cache.get(&TenantCacheKey::Id(TenantId::new())).await, None);
        assert!(!cache.is_available());
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss_and_opens_skip_window() {
        let clock = Arc::new(ManualClock::starting_now());
        let backend = Arc::new(InMemoryKeyValueCache::new(clock.clone()));
        let cache = TenantDirectoryCache::new(backend.clone(), clock);
        let key = TenantCacheKey::Identifier("acme".to_string());

        backend
            .set_string(&key.render(), "{not json".to_string(), DEFAULT_ENTRY_TTL)
            .await
            .unwrap();

        assert_eq!(cache.get(&key).await, None);
        assert!(!cache.is_available());

        // a valid entry written later is not read until the window passes
        backend
            .set_string(&key.render(), serde_json::to_string(&tenant()).unwrap(), DEFAULT_ENTRY_TTL)
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await, None);
    }
}
