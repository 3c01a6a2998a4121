//! Historical task backfill, grounded on
//! `asana_full_backfill_extractor.py`'s `FullBackfiller`.
//!
//! Walks every workspace's tasks backward from the last watermark (or the
//! beginning of time) via the descending search sweep, persisting the
//! watermark after each page so a time-budgeted run can resume where it
//! left off.

use chrono::{DateTime, Utc};
use ingest_artifacts::ArtifactRepository;
use ingest_client::sweep_descending_until;
use ingest_core::{BackfillId, IngestResult, TenantId, TriggerIndexing};
use std::sync::Arc;

use super::batch::AsanaTaskBatchBackfiller;
use super::api::AsanaApi;
use super::sync_state::AsanaSyncState;
use super::wire::AsanaWorkspace;

const ASANA_TASK_SOURCE: &str = "asana_task";

pub struct FullBackfiller {
    client: Arc<dyn AsanaApi>,
    db: Arc<dyn ArtifactRepository>,
    sync_state: Arc<AsanaSyncState>,
    trigger_indexing: Arc<dyn TriggerIndexing>,
    process_until: DateTime<Utc>,
    tenant_id: TenantId,
    backfill_id: BackfillId,
    suppress_notification: bool,
    task_batch_backfiller: Arc<AsanaTaskBatchBackfiller>,
}

impl FullBackfiller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn AsanaApi>,
        db: Arc<dyn ArtifactRepository>,
        sync_state: Arc<AsanaSyncState>,
        trigger_indexing: Arc<dyn TriggerIndexing>,
        process_until: DateTime<Utc>,
        tenant_id: TenantId,
        backfill_id: BackfillId,
        suppress_notification: bool,
    ) -> Self {
        let task_batch_backfiller = Arc::new(AsanaTaskBatchBackfiller::new(client.clone(), db.clone(), tenant_id));
        Self {
            client,
            db,
            sync_state,
            trigger_indexing,
            process_until,
            tenant_id,
            backfill_id,
            suppress_notification,
            task_batch_backfiller,
        }
    }

    /// Attempt to backfill across all workspaces. Returns `true` if every
    /// workspace is now fully backfilled, `false` if the time budget was hit
    /// in at least one of them.
    pub async fn backfill_workspaces(&self) -> IngestResult<bool> {
        let mut offset: Option<String> = None;
        let mut set = tokio::task::JoinSet::new();
        loop {
            let page = self.client.list_workspaces(offset).await?;
            for workspace in page.items {
                let client = self.client.clone();
                let db = self.db.clone();
                let sync_state = self.sync_state.clone();
                let trigger_indexing = self.trigger_indexing.clone();
                let process_until = self.process_until;
                let tenant_id = self.tenant_id;
                let backfill_id = self.backfill_id;
                let suppress_notification = self.suppress_notification;
                let task_batch_backfiller = self.task_batch_backfiller.clone();
                set.spawn(async move {
                    backfill_one_workspace(
                        client.as_ref(),
                        db.as_ref(),
                        sync_state.as_ref(),
                        trigger_indexing.as_ref(),
                        process_until,
                        tenant_id,
                        backfill_id,
                        suppress_notification,
                        task_batch_backfiller.as_ref(),
                        &workspace,
                    )
                    .await
                });
            }
            offset = page.next;
            if offset.is_none() {
                break;
            }
        }

        let mut all_complete = true;
        while let Some(result) = set.join_next().await {
            let complete = result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
            all_complete &= complete;
        }
        Ok(all_complete)
    }
}

#[allow(clippy::too_many_arguments)]
async fn backfill_one_workspace(
    client: &dyn AsanaApi,
    db: &dyn ArtifactRepository,
    sync_state: &AsanaSyncState,
    trigger_indexing: &dyn TriggerIndexing,
    process_until: DateTime<Utc>,
    tenant_id: TenantId,
    backfill_id: BackfillId,
    suppress_notification: bool,
    task_batch_backfiller: &AsanaTaskBatchBackfiller,
    workspace: &AsanaWorkspace,
) -> IngestResult<bool> {
    tracing::info!(workspace_gid = %workspace.gid, workspace_name = %workspace.name, "starting Asana workspace backfill");

    if sync_state.full_tasks_backfill_complete(&workspace.gid).await? {
        tracing::info!(workspace_gid = %workspace.gid, "skipping Asana workspace backfill, already complete");
        return Ok(true);
    }

    let synced_after = sync_state.full_tasks_synced_after(&workspace.gid).await?;
    let initial_before = Utc::now();

    let result = sweep_descending_until(
        initial_before,
        |before| client.search_tasks(&workspace.gid, before, synced_after, None),
        |page| async move {
            let batch = task_batch_backfiller.get_artifacts(workspace, &page, false).await?;

            let mut all_artifacts = batch.task_artifacts.clone();
            all_artifacts.extend(batch.secondary_artifacts);
            db.upsert_batch(&all_artifacts).await?;

            let task_entity_ids: Vec<String> = batch.task_artifacts.iter().map(|a| a.entity_id.clone()).collect();
            if !task_entity_ids.is_empty() {
                trigger_indexing
                    .trigger(&task_entity_ids, ASANA_TASK_SOURCE, tenant_id, Some(backfill_id), suppress_notification)
                    .await
                    .map_err(ingest_core::IngestError::Other)?;
            }

            if let Some(oldest) = page.last() {
                let oldest_modified_at = DateTime::parse_from_rfc3339(&oldest.modified_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                sync_state.set_full_tasks_synced_after(&workspace.gid, Some(oldest_modified_at)).await?;
            }

            Ok(Utc::now() < process_until)
        },
    )
    .await;

    match result {
        Ok(()) => {}
        Err(ingest_core::IngestError::PaymentRequired) => {
            tracing::warn!(
                workspace_gid = %workspace.gid,
                "skipping Asana workspace due to payment required error, search is a premium feature"
            );
        }
        Err(e) => return Err(e),
    }

    if Utc::now() >= process_until {
        tracing::info!(workspace_gid = %workspace.gid, "Asana workspace backfill time limit reached, enqueuing another job");
        return Ok(false);
    }

    tracing::info!(workspace_gid = %workspace.gid, "completed Asana workspace backfill, marking complete");
    sync_state.set_full_tasks_backfill_complete(&workspace.gid, true).await?;
    Ok(true)
}
