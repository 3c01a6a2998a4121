//! Ingestion daemon entry point: registers the cron schedule, starts a
//! queue-backed job dispatcher, and runs the worker pool that drains jobs
//! onto the per-source connectors.

mod config;
mod dispatcher;
mod tenant_pool;
mod worker;

use ingest_queue::{InMemoryWorkQueue, Scheduler, WorkQueue};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use config::IngestConfig;
use dispatcher::QueueJobDispatcher;
use tenant_pool::TenantPoolCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = Arc::new(IngestConfig::load()?);
    tracing::info!(tenant_count = config.tenants.len(), worker_concurrency = config.worker_concurrency, "starting ingest daemon");

    // An in-process queue is enough for a single-daemon deployment; a
    // durable SQS-backed `WorkQueue` can be swapped in here without
    // touching the scheduler or worker code, since both depend only on
    // the trait.
    let queue: Arc<dyn WorkQueue> = Arc::new(InMemoryWorkQueue::new());
    let pools = Arc::new(TenantPoolCache::new());

    let mut scheduler = Scheduler::new();
    dispatcher::register_jobs(&mut scheduler)?;
    let job_dispatcher = QueueJobDispatcher::new(queue.clone(), config.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let workers = worker::spawn_workers(queue.clone(), config.clone(), pools, shutdown_rx);

    tokio::select! {
        _ = scheduler.run(&job_dispatcher, None) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }

    tracing::info!("ingest daemon shut down cleanly");
    Ok(())
}
