//! Incremental issue sync, grounded on
//! `pylon_incremental_backfill_extractor.py`'s `PylonIncrementalBackfillExtractor`.
//!
//! Runs on a short cadence (every ~15 minutes) over a `[last_synced - 1s,
//! now)` window, with a 1-second overlap so an update landing exactly at
//! the previous run's boundary isn't missed. The window is chunked into
//! 30-day pieces to respect the issues endpoint's span limit, which only
//! matters if the job hasn't run in a long time.

use chrono::{DateTime, Duration, Utc};
use ingest_artifacts::ArtifactRepository;
use ingest_core::{BackfillId, IngestResult, TenantId, TriggerIndexing};
use std::sync::Arc;

use super::api::PylonApi;
use super::artifacts::build_issue_artifact;
use super::sync_state::PylonSyncState;
use super::wire::PylonIssue;

const PYLON_ISSUE_SOURCE: &str = "pylon_issue";
const MAX_WINDOW_DAYS: i64 = 30;
const BATCH_SIZE: usize = 50;
const DEFAULT_LOOKBACK_HOURS: i64 = 2;

pub struct IncrBackfiller {
    client: Arc<dyn PylonApi>,
    db: Arc<dyn ArtifactRepository>,
    sync_state: Arc<PylonSyncState>,
    trigger_indexing: Arc<dyn TriggerIndexing>,
    tenant_id: TenantId,
    backfill_id: BackfillId,
    suppress_notification: bool,
    lookback_hours: i64,
}

impl IncrBackfiller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn PylonApi>,
        db: Arc<dyn ArtifactRepository>,
        sync_state: Arc<PylonSyncState>,
        trigger_indexing: Arc<dyn TriggerIndexing>,
        tenant_id: TenantId,
        backfill_id: BackfillId,
        suppress_notification: bool,
        lookback_hours: Option<u32>,
    ) -> Self {
        Self {
            client,
            db,
            sync_state,
            trigger_indexing,
            tenant_id,
            backfill_id,
            suppress_notification,
            lookback_hours: lookback_hours.map(i64::from).unwrap_or(DEFAULT_LOOKBACK_HOURS),
        }
    }

    pub async fn backfill(&self) -> IngestResult<()> {
        let last_synced_until = self.sync_state.incr_issues_synced_until().await?;
        let start_window = match last_synced_until {
            Some(last) => last - Duration::seconds(1),
            None => Utc::now() - Duration::hours(self.lookback_hours),
        };
        let end_window = Utc::now();

        tracing::info!(start_window = %start_window, end_window = %end_window, "Pylon incremental backfill window");

        let mut issues_processed = 0u64;
        let mut chunk_start = start_window;
        while chunk_start < end_window {
            let chunk_end = (chunk_start + Duration::days(MAX_WINDOW_DAYS)).min(end_window);
            tracing::info!(chunk_start = %chunk_start, chunk_end = %chunk_end, "processing Pylon incremental chunk");

            let mut batch: Vec<PylonIssue> = Vec::new();
            let mut cursor = None;
            loop {
                let page = self.client.list_issues(chunk_start, chunk_end, cursor).await?;
                for issue in page.items {
                    batch.push(issue);
                    if batch.len() >= BATCH_SIZE {
                        self.process_issues_batch(&batch).await?;
                        issues_processed += batch.len() as u64;
                        batch.clear();
                    }
                }
                cursor = page.next;
                if cursor.is_none() {
                    break;
                }
            }

            if !batch.is_empty() {
                issues_processed += batch.len() as u64;
                self.process_issues_batch(&batch).await?;
            }

            chunk_start = chunk_end;
        }

        self.sync_state.set_incr_issues_synced_until(end_window).await?;
        tracing::info!(issues_processed, "Pylon incremental backfill complete");
        Ok(())
    }

    async fn process_issues_batch(&self, issues: &[PylonIssue]) -> IngestResult<()> {
        let artifacts: Vec<_> =
            issues.iter().map(|issue| build_issue_artifact(self.tenant_id, issue)).collect::<IngestResult<_>>()?;
        self.db.upsert_batch(&artifacts).await?;

        let entity_ids: Vec<String> = artifacts.iter().map(|a| a.entity_id.clone()).collect();
        self.trigger_indexing
            .trigger(&entity_ids, PYLON_ISSUE_SOURCE, self.tenant_id, Some(self.backfill_id), self.suppress_notification)
            .await
            .map_err(ingest_core::IngestError::Other)?;

        tracing::info!(count = issues.len(), "processed Pylon incremental issues batch");
        Ok(())
    }
}
