//! Typed cursor accessors over [`ingest_syncstate::SyncStateStore`],
//! grounded on `pylon_sync_service.py`'s `PylonSyncService`.

use chrono::{DateTime, Utc};
use ingest_core::IngestResult;
use ingest_syncstate::{key_for, SyncStateStore};
use std::sync::Arc;

pub struct PylonSyncState {
    store: Arc<dyn SyncStateStore>,
}

impl PylonSyncState {
    pub fn new(store: Arc<dyn SyncStateStore>) -> Self {
        Self { store }
    }

    pub async fn full_issues_backfill_complete(&self) -> IngestResult<bool> {
        Ok(self.store.get_bool(&key_for("pylon", "full_issues_backfill_complete", "tenant", "self")).await?.unwrap_or(false))
    }

    pub async fn set_full_issues_backfill_complete(&self, complete: bool) -> IngestResult<()> {
        self.store.set_bool(&key_for("pylon", "full_issues_backfill_complete", "tenant", "self"), Some(complete)).await
    }

    pub async fn full_issues_synced_after(&self) -> IngestResult<Option<DateTime<Utc>>> {
        self.store.get_instant(&key_for("pylon", "full_issues_synced_after", "tenant", "self")).await
    }

    pub async fn set_full_issues_synced_after(&self, value: DateTime<Utc>) -> IngestResult<()> {
        self.store.set_instant(&key_for("pylon", "full_issues_synced_after", "tenant", "self"), Some(value)).await
    }

    pub async fn full_issues_cursor(&self) -> IngestResult<Option<String>> {
        self.store.get_str(&key_for("pylon", "full_issues_cursor", "tenant", "self")).await
    }

    pub async fn set_full_issues_cursor(&self, value: Option<&str>) -> IngestResult<()> {
        self.store.set_str(&key_for("pylon", "full_issues_cursor", "tenant", "self"), value).await
    }

    pub async fn incr_issues_synced_until(&self) -> IngestResult<Option<DateTime<Utc>>> {
        self.store.get_instant(&key_for("pylon", "incr_issues_synced_until", "tenant", "self")).await
    }

    pub async fn set_incr_issues_synced_until(&self, value: DateTime<Utc>) -> IngestResult<()> {
        self.store.set_instant(&key_for("pylon", "incr_issues_synced_until", "tenant", "self"), Some(value)).await
    }

    pub async fn reference_data_synced_at(&self) -> IngestResult<Option<DateTime<Utc>>> {
        self.store.get_instant(&key_for("pylon", "reference_data_synced_at", "tenant", "self")).await
    }

    pub async fn set_reference_data_synced_at(&self, value: DateTime<Utc>) -> IngestResult<()> {
        self.store.set_instant(&key_for("pylon", "reference_data_synced_at", "tenant", "self"), Some(value)).await
    }
}
