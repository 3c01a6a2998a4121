//! Historical issue backfill, grounded on
//! `pylon_full_backfill_extractor.py`'s `PylonFullBackfiller`.
//!
//! The issues endpoint requires windows of at most 30 days, so the
//! backfill walks backward from now (or the saved watermark) in 30-day
//! windows down to a 2-year floor, persisting a mid-window page cursor so a
//! time-budgeted run resumes inside the same window rather than restarting
//! it.

use chrono::{DateTime, Duration, Utc};
use ingest_artifacts::ArtifactRepository;
use ingest_core::{BackfillId, IngestResult, TenantId, TriggerIndexing};
use std::sync::Arc;

use super::api::PylonApi;
use super::artifacts::build_issue_artifact;
use super::reference_data::PylonReferenceData;
use super::sync_state::PylonSyncState;
use super::wire::PylonIssue;

const PYLON_ISSUE_SOURCE: &str = "pylon_issue";
const WINDOW_DAYS: i64 = 30;
const FLOOR_DAYS: i64 = 365 * 2;

pub struct PylonFullBackfiller {
    client: Arc<dyn PylonApi>,
    db: Arc<dyn ArtifactRepository>,
    sync_state: Arc<PylonSyncState>,
    reference_data: PylonReferenceData,
    trigger_indexing: Arc<dyn TriggerIndexing>,
    process_until: DateTime<Utc>,
    tenant_id: TenantId,
    backfill_id: BackfillId,
    suppress_notification: bool,
}

impl PylonFullBackfiller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn PylonApi>,
        db: Arc<dyn ArtifactRepository>,
        sync_state: Arc<PylonSyncState>,
        trigger_indexing: Arc<dyn TriggerIndexing>,
        process_until: DateTime<Utc>,
        tenant_id: TenantId,
        backfill_id: BackfillId,
        suppress_notification: bool,
    ) -> Self {
        let reference_data =
            PylonReferenceData::new(client.clone(), db.clone(), sync_state.clone(), tenant_id);
        Self {
            client,
            db,
            sync_state,
            reference_data,
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
        if self.sync_state.full_issues_backfill_complete().await? {
            tracing::info!("skipping Pylon issue backfill, already complete");
            return Ok(true);
        }

        self.reference_data.sync_if_stale().await?;

        let synced_after = self.sync_state.full_issues_synced_after().await?;
        let mut end_time = synced_after.unwrap_or_else(Utc::now);
        let mut start_time = end_time - Duration::days(WINDOW_DAYS);
        let floor_time = Utc::now() - Duration::days(FLOOR_DAYS);

        let mut issues_processed = 0u64;

        while end_time > floor_time {
            start_time = start_time.max(floor_time);
            let mut cursor = self.sync_state.full_issues_cursor().await?;

            tracing::info!(
                start_time = %start_time,
                end_time = %end_time,
                resuming_from_cursor = cursor.is_some(),
                "processing Pylon issues window"
            );

            loop {
                let page = self.client.list_issues(start_time, end_time, cursor.clone()).await?;

                if !page.items.is_empty() {
                    self.process_issues_batch(&page.items).await?;
                    issues_processed += page.items.len() as u64;
                }

                if page.next.is_none() {
                    break;
                }

                if Utc::now() >= self.process_until {
                    self.sync_state.set_full_issues_cursor(page.next.as_deref()).await?;
                    tracing::info!(issues_processed, "Pylon backfill time limit reached, enqueuing another job");
                    self.sync_state.set_full_issues_synced_after(end_time).await?;
                    return Ok(false);
                }

                cursor = page.next;
            }

            self.sync_state.set_full_issues_cursor(None).await?;

            end_time = start_time - Duration::milliseconds(1);
            self.sync_state.set_full_issues_synced_after(end_time).await?;
            start_time = end_time - Duration::days(WINDOW_DAYS);

            if Utc::now() >= self.process_until {
                tracing::info!(issues_processed, "Pylon backfill time limit reached at window boundary");
                return Ok(false);
            }
        }

        self.sync_state.set_full_issues_backfill_complete(true).await?;
        tracing::info!(total_issues_processed = issues_processed, "Pylon full backfill complete");
        Ok(true)
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

        tracing::info!(count = issues.len(), "backfilled Pylon issues batch");
        Ok(())
    }
}
