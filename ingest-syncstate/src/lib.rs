//! Durable key/value storage for per-source, per-scope sync cursors and
//! watermarks, grounded on `AsanaSyncService` and its `config(key, value)`
//! table: every concrete cursor, watermark, or completion flag a connector
//! needs is expressed as a string key plus a typed accessor over the same
//! underlying store.
//!
//! Keys are namespaced by the caller (e.g.
//! `"asana:incr_sync_token:workspace:{gid}"`) rather than hardcoded here;
//! this crate only owns the string/bool/instant encoding and the storage
//! trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::IngestResult;

mod memory;
mod postgres;

pub use memory::InMemorySyncStateStore;
pub use postgres::PgSyncStateStore;

/// A durable key/value store for sync state, backed by a single
/// `config(key, value)` table (or an equivalent in-memory double in tests).
/// All methods key on an opaque caller-supplied string so this trait has no
/// knowledge of which connector or scope a cursor belongs to.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn get_str(&self, key: &str) -> IngestResult<Option<String>>;
    async fn set_str(&self, key: &str, value: Option<&str>) -> IngestResult<()>;

    async fn get_bool(&self, key: &str) -> IngestResult<Option<bool>> {
        Ok(self.get_str(key).await?.map(|v| v == "true"))
    }

    async fn set_bool(&self, key: &str, value: Option<bool>) -> IngestResult<()> {
        let encoded = value.map(|v| if v { "true" } else { "false" });
        self.set_str(key, encoded).await
    }

    async fn get_instant(&self, key: &str) -> IngestResult<Option<DateTime<Utc>>> {
        match self.get_str(key).await? {
            Some(raw) => {
                let parsed = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| ingest_core::IngestError::Other(e.into()))?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    async fn set_instant(&self, key: &str, value: Option<DateTime<Utc>>) -> IngestResult<()> {
        let encoded = value.map(|v| v.to_rfc3339());
        self.set_str(key, encoded.as_deref()).await
    }
}

/// Build the conventional key for a workspace/project/tenant-scoped cursor,
/// e.g. `key_for("asana", "incr_sync_token", "workspace", workspace_gid)` →
/// `"asana:incr_sync_token:workspace:{workspace_gid}"`.
pub fn key_for(source: &str, cursor: &str, scope_kind: &str, scope_id: &str) -> String {
    format!("{source}:{cursor}:{scope_kind}:{scope_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_for_matches_the_original_naming_convention() {
        assert_eq!(
            key_for("asana", "incr_sync_token", "workspace", "123"),
            "asana:incr_sync_token:workspace:123"
        );
    }
}
