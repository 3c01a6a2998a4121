//! Typed cursor accessors over [`ingest_syncstate::SyncStateStore`],
//! grounded on `asana_sync_service.py`'s key-naming scheme.

use chrono::{DateTime, Utc};
use ingest_core::IngestResult;
use ingest_syncstate::{key_for, SyncStateStore};
use std::sync::Arc;

pub struct AsanaSyncState {
    store: Arc<dyn SyncStateStore>,
}

impl AsanaSyncState {
    pub fn new(store: Arc<dyn SyncStateStore>) -> Self {
        Self { store }
    }

    pub async fn full_tasks_synced_after(&self, workspace_gid: &str) -> IngestResult<Option<DateTime<Utc>>> {
        self.store.get_instant(&key_for("asana", "full_tasks_synced_after", "workspace", workspace_gid)).await
    }

    pub async fn set_full_tasks_synced_after(
        &self,
        workspace_gid: &str,
        value: Option<DateTime<Utc>>,
    ) -> IngestResult<()> {
        self.store.set_instant(&key_for("asana", "full_tasks_synced_after", "workspace", workspace_gid), value).await
    }

    pub async fn full_tasks_backfill_complete(&self, workspace_gid: &str) -> IngestResult<bool> {
        Ok(self
            .store
            .get_bool(&key_for("asana", "full_tasks_backfill_complete", "workspace", workspace_gid))
            .await?
            .unwrap_or(false))
    }

    pub async fn set_full_tasks_backfill_complete(&self, workspace_gid: &str, complete: bool) -> IngestResult<()> {
        self.store
            .set_bool(&key_for("asana", "full_tasks_backfill_complete", "workspace", workspace_gid), Some(complete))
            .await
    }

    pub async fn incr_workspace_sync_token(&self, workspace_gid: &str) -> IngestResult<Option<String>> {
        self.store.get_str(&key_for("asana", "incr_workspace_sync_token", "workspace", workspace_gid)).await
    }

    pub async fn set_incr_workspace_sync_token(&self, workspace_gid: &str, value: Option<&str>) -> IngestResult<()> {
        self.store.set_str(&key_for("asana", "incr_workspace_sync_token", "workspace", workspace_gid), value).await
    }

    pub async fn incr_project_sync_token(&self, project_gid: &str) -> IngestResult<Option<String>> {
        self.store.get_str(&key_for("asana", "incr_project_sync_token", "project", project_gid)).await
    }

    pub async fn set_incr_project_sync_token(&self, project_gid: &str, value: Option<&str>) -> IngestResult<()> {
        self.store.set_str(&key_for("asana", "incr_project_sync_token", "project", project_gid), value).await
    }
}
