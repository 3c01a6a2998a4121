//! In-memory sync state store for tests: a `RwLock<HashMap<...>>`
//! mirroring the trait-object store.

use crate::SyncStateStore;
use async_trait::async_trait;
use ingest_core::IngestResult;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemorySyncStateStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySyncStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStateStore for InMemorySyncStateStore {
    async fn get_str(&self, key: &str) -> IngestResult<Option<String>> {
        Ok(self.values.read().unwrap().get(key).cloned())
    }

    async fn set_str(&self, key: &str, value: Option<&str>) -> IngestResult<()> {
        let mut values = self.values.write().unwrap();
        match value {
            Some(value) => {
                values.insert(key.to_string(), value.to_string());
            }
            None => {
                values.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_str_bool_and_instant() {
        let store = InMemorySyncStateStore::new();

        assert_eq!(store.get_str("k").await.unwrap(), None);
        store.set_str("k", Some("v")).await.unwrap();
        assert_eq!(store.get_str("k").await.unwrap(), Some("v".to_string()));
        store.set_str("k", None).await.unwrap();
        assert_eq!(store.get_str("k").await.unwrap(), None);

        store.set_bool("flag", Some(true)).await.unwrap();
        assert_eq!(store.get_bool("flag").await.unwrap(), Some(true));
        store.set_bool("flag", Some(false)).await.unwrap();
        assert_eq!(store.get_bool("flag").await.unwrap(), Some(false));

        let now = chrono::Utc::now();
        store.set_instant("ts", Some(now)).await.unwrap();
        let round_tripped = store.get_instant("ts").await.unwrap().unwrap();
        assert_eq!(round_tripped.timestamp_millis(), now.timestamp_millis());
    }

    #[tokio::test]
    async fn unset_keys_return_none() {
        let store = InMemorySyncStateStore::new();
        assert_eq!(store.get_bool("missing").await.unwrap(), None);
        assert_eq!(store.get_instant("missing").await.unwrap(), None);
    }
}
