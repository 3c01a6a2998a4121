//! Redis counter boundary, kept separate from `UsageTracker` for the same
//! reason as [`crate::db::UsageRecordStore`]: the quota-check logic should
//! be exercisable against an in-memory fake without a live Redis.

use async_trait::async_trait;
use ingest_core::{IngestError, IngestResult};
use redis::aio::ConnectionManager;

#[async_trait]
pub trait RedisCounterStore: Send + Sync {
    /// `GET key`, or `None` if unset.
    async fn get(&self, key: &str) -> IngestResult<Option<i64>>;

    /// `INCRBY key value`, then set a TTL on the key only if it has none
    /// yet (`TTL key == -1`), so a key's expiry is seeded once on first
    /// write and never reset by subsequent increments.
    async fn incrby_with_ttl_if_unset(&self, key: &str, value: i64, ttl_seconds: i64) -> IngestResult<()>;

    /// `SET key value` followed by an unconditional `EXPIRE`, used to
    /// (re)populate a key from a database fallback read.
    async fn set_with_ttl(&self, key: &str, value: i64, ttl_seconds: i64) -> IngestResult<()>;
}

#[async_trait]
impl RedisCounterStore for ConnectionManager {
    async fn get(&self, key: &str) -> IngestResult<Option<i64>> {
        let mut conn = self.clone();
        redis::cmd("GET").arg(key).query_async(&mut conn).await.map_err(|e| IngestError::Other(e.into()))
    }

    async fn incrby_with_ttl_if_unset(&self, key: &str, value: i64, ttl_seconds: i64) -> IngestResult<()> {
        let mut conn = self.clone();
        let _: i64 = redis::cmd("INCRBY").arg(key).arg(value).query_async(&mut conn).await.map_err(|e| IngestError::Other(e.into()))?;

        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await.map_err(|e| IngestError::Other(e.into()))?;

        if ttl == -1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_seconds)
                .query_async(&mut conn)
                .await
                .map_err(|e| IngestError::Other(e.into()))?;
        }
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: i64, ttl_seconds: i64) -> IngestResult<()> {
        let mut conn = self.clone();
        let _: () = redis::cmd("SET").arg(key).arg(value).query_async(&mut conn).await.map_err(|e| IngestError::Other(e.into()))?;
        let _: () = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| IngestError::Other(e.into()))?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Entry {
        value: i64,
        has_ttl: bool,
    }

    /// In-memory stand-in for a Redis connection, used to unit-test
    /// [`crate::tracker::UsageTracker`]'s quota and fallback logic without a
    /// live Redis instance.
    #[derive(Default)]
    pub struct MemoryRedisCounterStore {
        entries: Mutex<HashMap<String, Entry>>,
    }

    impl MemoryRedisCounterStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Force a key to simulate being unreachable once would-be, by
        /// clearing it; used to exercise the database-fallback path.
        pub fn clear(&self, key: &str) {
            self.entries.lock().unwrap().remove(key);
        }
    }

    #[async_trait]
    impl RedisCounterStore for MemoryRedisCounterStore {
        async fn get(&self, key: &str) -> IngestResult<Option<i64>> {
            Ok(self.entries.lock().unwrap().get(key).map(|e| e.value))
        }

        async fn incrby_with_ttl_if_unset(&self, key: &str, value: i64, _ttl_seconds: i64) -> IngestResult<()> {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(key.to_string()).or_default();
            entry.value += value;
            entry.has_ttl = true;
            Ok(())
        }

        async fn set_with_ttl(&self, key: &str, value: i64, _ttl_seconds: i64) -> IngestResult<()> {
            let mut entries = self.entries.lock().unwrap();
            entries.insert(key.to_string(), Entry { value, has_ttl: true });
            Ok(())
        }
    }
}
