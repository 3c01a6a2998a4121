//! Incremental task sync, grounded on
//! `pylon_incremental_backfill_extractor.py`'s short-cadence watermark
//! sweep, applied across every list in the hierarchy rather than a single
//! flat endpoint.

use chrono::{DateTime, Duration, Utc};
use ingest_artifacts::ArtifactRepository;
use ingest_core::{BackfillId, IngestResult, TenantId, TriggerIndexing};
use std::sync::Arc;

use super::api::TrackerApi;
use super::batch::TrackerTaskBatchBackfiller;
use super::full_backfill::list_all_lists;
use super::sync_state::TrackerSyncState;

const TRACKER_TASK_SOURCE: &str = "tracker_task";
const DEFAULT_LOOKBACK_HOURS: i64 = 2;

pub struct TrackerIncrBackfiller {
    client: Arc<dyn TrackerApi>,
    db: Arc<dyn ArtifactRepository>,
    sync_state: Arc<TrackerSyncState>,
    batch_backfiller: Arc<TrackerTaskBatchBackfiller>,
    trigger_indexing: Arc<dyn TriggerIndexing>,
    tenant_id: TenantId,
    backfill_id: BackfillId,
    suppress_notification: bool,
    lookback_hours: i64,
}

impl TrackerIncrBackfiller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn TrackerApi>,
        db: Arc<dyn ArtifactRepository>,
        sync_state: Arc<TrackerSyncState>,
        trigger_indexing: Arc<dyn TriggerIndexing>,
        tenant_id: TenantId,
        backfill_id: BackfillId,
        suppress_notification: bool,
        lookback_hours: Option<u32>,
    ) -> Self {
        let batch_backfiller = Arc::new(TrackerTaskBatchBackfiller::new(client.clone(), db.clone(), tenant_id));
        Self {
            client,
            db,
            sync_state,
            batch_backfiller,
            trigger_indexing,
            tenant_id,
            backfill_id,
            suppress_notification,
            lookback_hours: lookback_hours.map(i64::from).unwrap_or(DEFAULT_LOOKBACK_HOURS),
        }
    }

    pub async fn backfill(&self) -> IngestResult<()> {
        let synced_until = self.sync_state.incr_synced_until().await?;
        let synced_after: DateTime<Utc> = match synced_until {
            Some(last) => last - Duration::seconds(1),
            None => Utc::now() - Duration::hours(self.lookback_hours),
        };
        let run_started_at = Utc::now();

        tracing::info!(synced_after = %synced_after, "tracker incremental backfill window");

        let lists = list_all_lists(self.client.as_ref()).await?;
        let mut tasks_processed = 0u64;

        for list in &lists {
            let mut page = 1u32;
            loop {
                let fetched = self.client.list_tasks(&list.id, page, false, None, Some(synced_after)).await?;

                if !fetched.items.is_empty() {
                    let artifacts = self.batch_backfiller.get_artifacts(&fetched.items, &list.id).await?;
                    self.process_batch(&artifacts).await?;
                    tasks_processed += artifacts.task_artifacts.len() as u64;
                }

                let Some(next) = fetched.next else { break };
                page = next.parse().unwrap_or(page + 1);
            }
        }

        self.sync_state.set_incr_synced_until(run_started_at).await?;
        tracing::info!(tasks_processed, "tracker incremental backfill complete");
        Ok(())
    }

    async fn process_batch(&self, artifacts: &super::batch::TaskBatchArtifacts) -> IngestResult<()> {
        self.db.upsert_batch(&artifacts.task_artifacts).await?;
        self.db.upsert_batch(&artifacts.secondary_artifacts).await?;

        let entity_ids: Vec<String> = artifacts.task_artifacts.iter().map(|a| a.entity_id.clone()).collect();
        self.trigger_indexing
            .trigger(&entity_ids, TRACKER_TASK_SOURCE, self.tenant_id, Some(self.backfill_id), self.suppress_notification)
            .await
            .map_err(ingest_core::IngestError::Other)?;

        tracing::info!(count = artifacts.task_artifacts.len(), "processed tracker incremental tasks batch");
        Ok(())
    }
}
