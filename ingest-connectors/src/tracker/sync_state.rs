//! Typed accessors over [`ingest_syncstate::SyncStateStore`], grounded on
//! `pylon_sync_service.py`'s `PylonSyncService`.

use chrono::{DateTime, Utc};
use ingest_core::IngestResult;
use ingest_syncstate::{key_for, SyncStateStore};
use std::sync::Arc;

pub struct TrackerSyncState {
    store: Arc<dyn SyncStateStore>,
}

impl TrackerSyncState {
    pub fn new(store: Arc<dyn SyncStateStore>) -> Self {
        Self { store }
    }

    pub async fn full_backfill_complete(&self) -> IngestResult<bool> {
        Ok(self.store.get_bool(&key_for("tracker", "full_backfill_complete", "tenant", "self")).await?.unwrap_or(false))
    }

    pub async fn set_full_backfill_complete(&self, complete: bool) -> IngestResult<()> {
        self.store.set_bool(&key_for("tracker", "full_backfill_complete", "tenant", "self"), Some(complete)).await
    }

    /// Index into the flattened list-of-lists the full backfill was on
    /// when it last hit its time budget.
    pub async fn full_list_index(&self) -> IngestResult<Option<i64>> {
        let raw = self.store.get_str(&key_for("tracker", "full_list_index", "tenant", "self")).await?;
        Ok(raw.and_then(|v| v.parse().ok()))
    }

    pub async fn set_full_list_index(&self, value: i64) -> IngestResult<()> {
        self.store
            .set_str(&key_for("tracker", "full_list_index", "tenant", "self"), Some(&value.to_string()))
            .await
    }

    pub async fn full_list_cursor(&self) -> IngestResult<Option<String>> {
        self.store.get_str(&key_for("tracker", "full_list_cursor", "tenant", "self")).await
    }

    pub async fn set_full_list_cursor(&self, value: Option<&str>) -> IngestResult<()> {
        self.store.set_str(&key_for("tracker", "full_list_cursor", "tenant", "self"), value).await
    }

    pub async fn incr_synced_until(&self) -> IngestResult<Option<DateTime<Utc>>> {
        self.store.get_instant(&key_for("tracker", "incr_synced_until", "tenant", "self")).await
    }

    pub async fn set_incr_synced_until(&self, value: DateTime<Utc>) -> IngestResult<()> {
        self.store.set_instant(&key_for("tracker", "incr_synced_until", "tenant", "self"), Some(value)).await
    }
}
