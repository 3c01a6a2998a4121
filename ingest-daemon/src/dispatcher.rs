//! Cron-to-queue fan-out, matching [`ingest_queue::JobDispatcher`]'s stated
//! contract: when a scheduled job comes due, enqueue one message per
//! tenant that has the job's source configured.

use async_trait::async_trait;
use ingest_queue::{BackfillEnvelope, IngestMessage, WorkQueue};
use std::sync::Arc;

use crate::config::IngestConfig;

pub const ASANA_FULL_BACKFILL_JOB: &str = "asana_full_backfill";
pub const ASANA_INCR_BACKFILL_JOB: &str = "asana_incr_backfill";
pub const ASANA_PERMISSIONS_BACKFILL_JOB: &str = "asana_permissions_backfill";
pub const PYLON_FULL_BACKFILL_JOB: &str = "pylon_full_backfill";
pub const PYLON_INCR_BACKFILL_JOB: &str = "pylon_incr_backfill";
pub const TRACKER_FULL_BACKFILL_JOB: &str = "tracker_full_backfill";
pub const TRACKER_INCR_BACKFILL_JOB: &str = "tracker_incr_backfill";
pub const TRACKER_PERMISSIONS_BACKFILL_JOB: &str = "tracker_permissions_backfill";

pub struct QueueJobDispatcher {
    queue: Arc<dyn WorkQueue>,
    config: Arc<IngestConfig>,
}

impl QueueJobDispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>, config: Arc<IngestConfig>) -> Self {
        Self { queue, config }
    }

    async fn enqueue_for_asana_tenants(&self, build: impl Fn(BackfillEnvelope) -> IngestMessage) -> anyhow::Result<()> {
        for tenant in self.config.tenants.iter().filter(|t| t.asana_enabled()) {
            self.queue.send(build(BackfillEnvelope::new(tenant.tenant_id))).await?;
        }
        Ok(())
    }

    async fn enqueue_for_pylon_tenants(&self, build: impl Fn(BackfillEnvelope) -> IngestMessage) -> anyhow::Result<()> {
        for tenant in self.config.tenants.iter().filter(|t| t.pylon_enabled()) {
            self.queue.send(build(BackfillEnvelope::new(tenant.tenant_id))).await?;
        }
        Ok(())
    }

    async fn enqueue_for_tracker_tenants(&self, build: impl Fn(BackfillEnvelope) -> IngestMessage) -> anyhow::Result<()> {
        for tenant in self.config.tenants.iter().filter(|t| t.tracker_enabled()) {
            self.queue.send(build(BackfillEnvelope::new(tenant.tenant_id))).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ingest_queue::JobDispatcher for QueueJobDispatcher {
    async fn dispatch(&self, job_id: &str) -> anyhow::Result<()> {
        let duration_seconds = self.config.full_backfill_duration.as_secs();
        let lookback_hours = self.config.pylon_lookback_hours;

        match job_id {
            ASANA_FULL_BACKFILL_JOB => {
                self.enqueue_for_asana_tenants(|envelope| IngestMessage::AsanaFullBackfill { envelope, duration_seconds })
                    .await
            }
            ASANA_INCR_BACKFILL_JOB => {
                self.enqueue_for_asana_tenants(|envelope| IngestMessage::AsanaIncrBackfill { envelope }).await
            }
            ASANA_PERMISSIONS_BACKFILL_JOB => {
                self.enqueue_for_asana_tenants(|envelope| IngestMessage::AsanaPermissionsBackfill { envelope }).await
            }
            PYLON_FULL_BACKFILL_JOB => {
                self.enqueue_for_pylon_tenants(|envelope| IngestMessage::PylonFullBackfill { envelope, duration_seconds })
                    .await
            }
            PYLON_INCR_BACKFILL_JOB => {
                self.enqueue_for_pylon_tenants(|envelope| IngestMessage::PylonIncrBackfill { envelope, lookback_hours })
                    .await
            }
            TRACKER_FULL_BACKFILL_JOB => {
                self.enqueue_for_tracker_tenants(|envelope| IngestMessage::TrackerFullBackfill { envelope, duration_seconds })
                    .await
            }
            TRACKER_INCR_BACKFILL_JOB => {
                self.enqueue_for_tracker_tenants(|envelope| IngestMessage::TrackerIncrBackfill { envelope, lookback_hours })
                    .await
            }
            TRACKER_PERMISSIONS_BACKFILL_JOB => {
                self.enqueue_for_tracker_tenants(|envelope| IngestMessage::TrackerPermissionsBackfill { envelope }).await
            }
            other => {
                tracing::warn!(job_id = other, "dispatch called for an unregistered job id");
                Ok(())
            }
        }
    }
}

/// Register the daemon's standing cron schedule. Cadences mirror
/// `src/cron/jobs/asana.py`'s tags: full backfills run nightly, incremental
/// syncs run every few minutes, and permissions refresh weekly.
pub fn register_jobs(scheduler: &mut ingest_queue::Scheduler) -> ingest_core::IngestResult<()> {
    scheduler.register(ASANA_FULL_BACKFILL_JOB, "17 2 * * *", vec!["asana"])?;
    scheduler.register(ASANA_INCR_BACKFILL_JOB, "*/10 * * * *", vec!["asana"])?;
    scheduler.register(ASANA_PERMISSIONS_BACKFILL_JOB, "23 3 * * 0", vec!["asana"])?;
    scheduler.register(PYLON_FULL_BACKFILL_JOB, "41 2 * * *", vec!["pylon"])?;
    scheduler.register(PYLON_INCR_BACKFILL_JOB, "*/15 * * * *", vec!["pylon"])?;
    scheduler.register(TRACKER_FULL_BACKFILL_JOB, "59 2 * * *", vec!["tracker"])?;
    scheduler.register(TRACKER_INCR_BACKFILL_JOB, "*/15 * * * *", vec!["tracker"])?;
    scheduler.register(TRACKER_PERMISSIONS_BACKFILL_JOB, "37 3 * * 0", vec!["tracker"])?;
    Ok(())
}
