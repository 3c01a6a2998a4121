//! Historical task backfill, grounded on
//! `pylon_full_backfill_extractor.py`'s windowed-resume shape applied to a
//! hierarchical teams/spaces/lists traversal instead of Pylon's flat issue
//! stream.
//!
//! Every list in the tenant's workspace is walked independently, newest
//! task first (`reverse = true`, no lower bound — this is a historical
//! sweep, not a window). A time-budgeted run persists which list it was on
//! and its in-list page cursor so the next job resumes there instead of
//! restarting from the first list.

use chrono::{DateTime, Utc};
use ingest_artifacts::ArtifactRepository;
use ingest_core::{BackfillId, IngestResult, TenantId, TriggerIndexing};
use std::sync::Arc;

use super::api::TrackerApi;
use super::batch::TrackerTaskBatchBackfiller;
use super::sync_state::TrackerSyncState;
use super::wire::TrackerList;

const TRACKER_TASK_SOURCE: &str = "tracker_task";

pub struct TrackerFullBackfiller {
    client: Arc<dyn TrackerApi>,
    db: Arc<dyn ArtifactRepository>,
    sync_state: Arc<TrackerSyncState>,
    batch_backfiller: Arc<TrackerTaskBatchBackfiller>,
    trigger_indexing: Arc<dyn TriggerIndexing>,
    process_until: DateTime<Utc>,
    tenant_id: TenantId,
    backfill_id: BackfillId,
    suppress_notification: bool,
}

impl TrackerFullBackfiller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn TrackerApi>,
        db: Arc<dyn ArtifactRepository>,
        sync_state: Arc<TrackerSyncState>,
        trigger_indexing: Arc<dyn TriggerIndexing>,
        process_until: DateTime<Utc>,
        tenant_id: TenantId,
        backfill_id: BackfillId,
        suppress_notification: bool,
    ) -> Self {
        let batch_backfiller = Arc::new(TrackerTaskBatchBackfiller::new(client.clone(), db.clone(), tenant_id));
        Self {
            client,
            db,
            sync_state,
            batch_backfiller,
            trigger_indexing,
            process_until,
            tenant_id,
            backfill_id,
            suppress_notification,
        }
    }

    /// Returns `true` if the backfill is now fully complete, `false` if the
    /// time budget was hit and another job should be enqueued.
    pub async fn backfill(&self) -> IngestResult<bool> {
        if self.sync_state.full_backfill_complete().await? {
            tracing::info!("skipping tracker backfill, already complete");
            return Ok(true);
        }

        let lists = list_all_lists(self.client.as_ref()).await?;
        let resume_index = self.sync_state.full_list_index().await?.unwrap_or(0) as usize;
        let mut list_cursor = self.sync_state.full_list_cursor().await?;

        let mut tasks_processed = 0u64;

        for (index, list) in lists.iter().enumerate() {
            if index < resume_index {
                continue;
            }

            tracing::info!(list_id = %list.id, list_name = %list.name, "backfilling tracker list");

            let mut page = list_cursor.as_deref().unwrap_or("1").parse().unwrap_or(1);
            list_cursor = None;

            loop {
                let fetched = self.client.list_tasks(&list.id, page, true, None, None).await?;

                if !fetched.items.is_empty() {
                    let artifacts = self.batch_backfiller.get_artifacts(&fetched.items, &list.id).await?;
                    self.process_batch(&artifacts).await?;
                    tasks_processed += artifacts.task_artifacts.len() as u64;
                }

                let Some(next) = fetched.next else { break };

                if Utc::now() >= self.process_until {
                    self.sync_state.set_full_list_index(index as i64).await?;
                    self.sync_state.set_full_list_cursor(Some(&next)).await?;
                    tracing::info!(tasks_processed, "tracker backfill time limit reached, enqueuing another job");
                    return Ok(false);
                }

                page = next.parse().unwrap_or(page + 1);
            }

            if Utc::now() >= self.process_until && index + 1 < lists.len() {
                self.sync_state.set_full_list_index(index as i64 + 1).await?;
                self.sync_state.set_full_list_cursor(None).await?;
                tracing::info!(tasks_processed, "tracker backfill time limit reached at list boundary");
                return Ok(false);
            }
        }

        self.sync_state.set_full_backfill_complete(true).await?;
        tracing::info!(total_tasks_processed = tasks_processed, "tracker full backfill complete");
        Ok(true)
    }

    async fn process_batch(&self, artifacts: &super::batch::TaskBatchArtifacts) -> IngestResult<()> {
        self.db.upsert_batch(&artifacts.task_artifacts).await?;
        self.db.upsert_batch(&artifacts.secondary_artifacts).await?;

        let entity_ids: Vec<String> = artifacts.task_artifacts.iter().map(|a| a.entity_id.clone()).collect();
        self.trigger_indexing
            .trigger(&entity_ids, TRACKER_TASK_SOURCE, self.tenant_id, Some(self.backfill_id), self.suppress_notification)
            .await
            .map_err(ingest_core::IngestError::Other)?;

        tracing::info!(count = artifacts.task_artifacts.len(), "backfilled tracker tasks batch");
        Ok(())
    }
}

/// Flatten the team/space/list hierarchy into the list of lists a task
/// backfill walks. Fetched fresh on every call since the hierarchy itself
/// has no separate sync cadence.
pub(crate) async fn list_all_lists(client: &dyn TrackerApi) -> IngestResult<Vec<TrackerList>> {
    let mut lists = Vec::new();
    for team in client.list_teams().await? {
        for space in client.list_spaces(&team.id).await? {
            lists.extend(client.list_lists(&space.id).await?);
        }
    }
    Ok(lists)
}
