//! Queue consumer loop: receive a message, build the per-tenant clients
//! and repositories it needs, and hand it to the matching connector.
//! Mirrors the original system's worker, which pulls one backfill config
//! off SQS and routes on its discriminant to the matching extractor.

use chrono::Duration as ChronoDuration;
use ingest_artifacts::PgArtifactRepository;
use ingest_core::{BackfillId, EntityIdType, IngestError, LogContext, NullTriggerIndexing, TriggerIndexing};
use ingest_queue::{IngestMessage, QueuedMessage, WorkQueue};
use ingest_syncstate::PgSyncStateStore;
use std::sync::Arc;
use tracing::Instrument;

use ingest_connectors::asana::{AllPermissionsBackfiller, AsanaHttpApi, AsanaSyncState, FullBackfiller as AsanaFullBackfiller, IncrBackfiller as AsanaIncrBackfiller};
use ingest_connectors::custom_data::CustomDataIngestor;
use ingest_connectors::pylon::{PylonFullBackfiller, PylonHttpApi, PylonIncrBackfiller, PylonSyncState};
use ingest_connectors::tracker::{
    TrackerFullBackfiller, TrackerHttpApi, TrackerIncrBackfiller, TrackerPermissionBackfiller, TrackerSyncState,
};

use crate::config::IngestConfig;
use crate::tenant_pool::TenantPoolCache;

pub struct Worker {
    queue: Arc<dyn WorkQueue>,
    config: Arc<IngestConfig>,
    pools: Arc<TenantPoolCache>,
    trigger_indexing: Arc<dyn TriggerIndexing>,
}

impl Worker {
    pub fn new(queue: Arc<dyn WorkQueue>, config: Arc<IngestConfig>, pools: Arc<TenantPoolCache>) -> Self {
        Self { queue, config, pools, trigger_indexing: Arc::new(NullTriggerIndexing) }
    }

    /// Pull messages off the queue until `shutdown` fires, processing one
    /// at a time per worker task. `run` is expected to be spawned
    /// `worker_concurrency` times by the caller.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let received = self.queue.receive(1, self.config.visibility_timeout).await;
            let messages = match received {
                Ok(messages) => messages,
                Err(err) => {
                    tracing::error!(error = %err, "failed to receive from work queue");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            if messages.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }

            for (handle, queued) in messages {
                match self.process(&queued).await {
                    Ok(()) => {
                        if let Err(err) = self.queue.delete(handle).await {
                            tracing::error!(error = %err, "failed to delete processed message");
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, source = queued.message.source(), "job processing failed, leaving message for redelivery");
                    }
                }
            }
        }
    }

    async fn process(&self, queued: &QueuedMessage) -> anyhow::Result<()> {
        let tenant_id = queued.message.tenant_id();
        let mut log_context = LogContext::new(tenant_id, queued.message.source());
        if let Some(backfill_id) = queued.message.envelope().backfill_id {
            log_context = log_context.with_backfill(backfill_id);
        }
        let span = log_context.into_span();
        self.process_inner(queued, tenant_id).instrument(span).await
    }

    async fn process_inner(&self, queued: &QueuedMessage, tenant_id: ingest_core::TenantId) -> anyhow::Result<()> {
        let Some(tenant) = self.config.tenant(tenant_id) else {
            tracing::warn!(%tenant_id, "received job for an unconfigured tenant, dropping");
            return Ok(());
        };

        let pool = self.pools.pool_for(tenant_id, &tenant.database_url)?;
        let db: Arc<dyn ingest_artifacts::ArtifactRepository> =
            Arc::new(PgArtifactRepository::new(pool.clone(), tenant_id));
        let sync_state_store: Arc<dyn ingest_syncstate::SyncStateStore> = Arc::new(PgSyncStateStore::new(pool));

        match &queued.message {
            IngestMessage::AsanaFullBackfill { envelope, duration_seconds } => {
                let token = tenant.asana_access_token.as_deref();
                let client = Arc::new(AsanaHttpApi::new(tenant_id, token)?);
                let sync_state = Arc::new(AsanaSyncState::new(sync_state_store));
                let backfill_id = envelope.backfill_id.unwrap_or_else(BackfillId::now_v7);
                let process_until = queued.enqueued_at + ChronoDuration::seconds(*duration_seconds as i64);

                let backfiller = AsanaFullBackfiller::new(
                    client,
                    db,
                    sync_state,
                    self.trigger_indexing.clone(),
                    process_until,
                    tenant_id,
                    backfill_id,
                    envelope.suppress_notification,
                );
                let complete = backfiller.backfill_workspaces().await?;
                if !complete {
                    self.requeue_full_backfill(&queued.message, backfill_id, *duration_seconds).await?;
                }
                Ok(())
            }
            IngestMessage::AsanaIncrBackfill { envelope } => {
                let token = tenant.asana_access_token.as_deref();
                let client = Arc::new(AsanaHttpApi::new(tenant_id, token)?);
                let sync_state = Arc::new(AsanaSyncState::new(sync_state_store));
                let backfill_id = envelope.backfill_id.unwrap_or_else(BackfillId::now_v7);

                let backfiller = AsanaIncrBackfiller::new(
                    client,
                    db,
                    sync_state,
                    self.trigger_indexing.clone(),
                    tenant_id,
                    backfill_id,
                    envelope.suppress_notification,
                );
                backfiller.backfill().await?;
                Ok(())
            }
            IngestMessage::AsanaPermissionsBackfill { .. } => {
                let token = tenant.asana_access_token.as_deref();
                let client = Arc::new(AsanaHttpApi::new(tenant_id, token)?);
                let backfiller = AllPermissionsBackfiller::new(client, db, tenant_id);
                backfiller.backfill_all_permissions().await?;
                Ok(())
            }
            IngestMessage::PylonFullBackfill { envelope, duration_seconds } => {
                let token = tenant
                    .pylon_api_token
                    .as_deref()
                    .ok_or_else(|| IngestError::Other(anyhow::anyhow!("tenant has no Pylon API token configured")))?;
                let client = Arc::new(PylonHttpApi::new(tenant_id, token)?);
                let sync_state = Arc::new(PylonSyncState::new(sync_state_store));
                let backfill_id = envelope.backfill_id.unwrap_or_else(BackfillId::now_v7);
                let process_until = queued.enqueued_at + ChronoDuration::seconds(*duration_seconds as i64);

                let backfiller = PylonFullBackfiller::new(
                    client,
                    db,
                    sync_state,
                    self.trigger_indexing.clone(),
                    process_until,
                    tenant_id,
                    backfill_id,
                    envelope.suppress_notification,
                );
                let complete = backfiller.backfill().await?;
                if !complete {
                    self.requeue_full_backfill(&queued.message, backfill_id, *duration_seconds).await?;
                }
                Ok(())
            }
            IngestMessage::PylonIncrBackfill { envelope, lookback_hours } => {
                let token = tenant
                    .pylon_api_token
                    .as_deref()
                    .ok_or_else(|| IngestError::Other(anyhow::anyhow!("tenant has no Pylon API token configured")))?;
                let client = Arc::new(PylonHttpApi::new(tenant_id, token)?);
                let sync_state = Arc::new(PylonSyncState::new(sync_state_store));
                let backfill_id = envelope.backfill_id.unwrap_or_else(BackfillId::now_v7);

                let backfiller = PylonIncrBackfiller::new(
                    client,
                    db,
                    sync_state,
                    self.trigger_indexing.clone(),
                    tenant_id,
                    backfill_id,
                    envelope.suppress_notification,
                    Some(*lookback_hours),
                );
                backfiller.backfill().await?;
                Ok(())
            }
            IngestMessage::TrackerFullBackfill { envelope, duration_seconds } => {
                let token = tenant
                    .tracker_api_token
                    .as_deref()
                    .ok_or_else(|| IngestError::Other(anyhow::anyhow!("tenant has no tracker API token configured")))?;
                let client = Arc::new(TrackerHttpApi::new(tenant_id, token)?);
                let sync_state = Arc::new(TrackerSyncState::new(sync_state_store));
                let backfill_id = envelope.backfill_id.unwrap_or_else(BackfillId::now_v7);
                let process_until = queued.enqueued_at + ChronoDuration::seconds(*duration_seconds as i64);

                let backfiller = TrackerFullBackfiller::new(
                    client,
                    db,
                    sync_state,
                    self.trigger_indexing.clone(),
                    process_until,
                    tenant_id,
                    backfill_id,
                    envelope.suppress_notification,
                );
                let complete = backfiller.backfill().await?;
                if !complete {
                    self.requeue_full_backfill(&queued.message, backfill_id, *duration_seconds).await?;
                }
                Ok(())
            }
            IngestMessage::TrackerIncrBackfill { envelope, lookback_hours } => {
                let token = tenant
                    .tracker_api_token
                    .as_deref()
                    .ok_or_else(|| IngestError::Other(anyhow::anyhow!("tenant has no tracker API token configured")))?;
                let client = Arc::new(TrackerHttpApi::new(tenant_id, token)?);
                let sync_state = Arc::new(TrackerSyncState::new(sync_state_store));
                let backfill_id = envelope.backfill_id.unwrap_or_else(BackfillId::now_v7);

                let backfiller = TrackerIncrBackfiller::new(
                    client,
                    db,
                    sync_state,
                    self.trigger_indexing.clone(),
                    tenant_id,
                    backfill_id,
                    envelope.suppress_notification,
                    Some(*lookback_hours),
                );
                backfiller.backfill().await?;
                Ok(())
            }
            IngestMessage::TrackerPermissionsBackfill { .. } => {
                let token = tenant
                    .tracker_api_token
                    .as_deref()
                    .ok_or_else(|| IngestError::Other(anyhow::anyhow!("tenant has no tracker API token configured")))?;
                let client = Arc::new(TrackerHttpApi::new(tenant_id, token)?);
                let backfiller = TrackerPermissionBackfiller::new(client, db, tenant_id);
                backfiller.backfill_all_permissions().await?;
                Ok(())
            }
            IngestMessage::CustomDataIngest { envelope, slug, documents } => {
                let ingestor = CustomDataIngestor::new(db, self.trigger_indexing.clone());
                ingestor.ingest(tenant_id, slug, documents, envelope.backfill_id, envelope.suppress_notification).await?;
                Ok(())
            }
        }
    }

    /// Time budget was hit before every workspace/window finished; put a
    /// continuation message back on the queue carrying the same
    /// `backfill_id` so the whole multi-job run is still attributed to one
    /// backfill once it eventually completes.
    async fn requeue_full_backfill(
        &self,
        original: &IngestMessage,
        backfill_id: BackfillId,
        duration_seconds: u64,
    ) -> anyhow::Result<()> {
        let mut envelope = original.envelope().clone();
        envelope.backfill_id = Some(backfill_id);

        let continuation = match original {
            IngestMessage::AsanaFullBackfill { .. } => IngestMessage::AsanaFullBackfill { envelope, duration_seconds },
            IngestMessage::PylonFullBackfill { .. } => IngestMessage::PylonFullBackfill { envelope, duration_seconds },
            IngestMessage::TrackerFullBackfill { .. } => IngestMessage::TrackerFullBackfill { envelope, duration_seconds },
            _ => return Ok(()),
        };

        tracing::info!(source = continuation.source(), %backfill_id, "time budget exhausted, enqueuing continuation job");
        self.queue.send(continuation).await.map_err(anyhow::Error::from)
    }
}

/// Spawn `worker_concurrency` copies of the worker loop, returning their
/// join handles so the caller can await a clean shutdown.
pub fn spawn_workers(
    queue: Arc<dyn WorkQueue>,
    config: Arc<IngestConfig>,
    pools: Arc<TenantPoolCache>,
    shutdown: tokio::sync::watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    (0..config.worker_concurrency.max(1))
        .map(|_| {
            let worker = Worker::new(queue.clone(), config.clone(), pools.clone());
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker.run(shutdown).await })
        })
        .collect()
}
