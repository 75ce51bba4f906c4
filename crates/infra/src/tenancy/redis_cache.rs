//! Redis-backed [`KeyValueCache`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use super::kv::{CacheError, KeyValueCache};

#[derive(Clone)]
pub struct RedisKeyValueCache {
    conn: MultiplexedConnection,
}

impl RedisKeyValueCache {
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Unavailable(format!("failed to open redis client: {e}")))?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| CacheError::Unavailable(format!("failed to connect to redis: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueCache for RedisKeyValueCache {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Unavailable(format!("redis GET failed: {e}")))?;
        Ok(value)
    }

    async fn set_string(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Unavailable(format!("redis SET failed: {e}")))?;
        Ok(())
    }
}
