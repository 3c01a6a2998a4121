//! In-process cron scheduler, grounded on `src/cron/jobs/asana.py`'s
//! `@cron(id=..., crontab=..., tags=[...])` decorator: named jobs register
//! a 5-field crontab expression and a set of tags, and a single scheduler
//! loop dispatches each job when its schedule comes due.
//!
//! The `cron` crate expects a leading seconds field, so a standard 5-field
//! unix crontab (`"7 * * * *"`) is adapted by prepending `"0 "` before
//! parsing rather than asking callers to spell out the extra field.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use ingest_core::{IngestError, IngestResult};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct CronJob {
    pub id: &'static str,
    pub schedule: Schedule,
    pub tags: Vec<&'static str>,
}

/// Dispatch target invoked when a job comes due. Implementations typically
/// look up active tenants for the job's source and enqueue one
/// [`crate::IngestMessage`] per tenant onto a [`crate::WorkQueue`]. Errors
/// are logged by the scheduler and never stop the loop — a single bad tick
/// should not take down every other job's schedule.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job_id: &str) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<CronJob>,
}

fn parse_five_field_crontab(crontab: &str) -> IngestResult<Schedule> {
    let with_seconds = format!("0 {crontab}");
    Schedule::from_str(&with_seconds).map_err(|e| IngestError::Other(e.into()))
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: &'static str,
        crontab: &str,
        tags: Vec<&'static str>,
    ) -> IngestResult<()> {
        let schedule = parse_five_field_crontab(crontab)?;
        self.jobs.push(CronJob { id, schedule, tags });
        Ok(())
    }

    pub fn jobs(&self) -> &[CronJob] {
        &self.jobs
    }

    pub fn jobs_with_tag(&self, tag: &str) -> impl Iterator<Item = &CronJob> {
        self.jobs.iter().filter(move |job| job.tags.iter().any(|t| *t == tag))
    }

    fn next_fire_times(&self, after: DateTime<Utc>) -> HashMap<&'static str, DateTime<Utc>> {
        self.jobs
            .iter()
            .filter_map(|job| job.schedule.after(&after).next().map(|at| (job.id, at)))
            .collect()
    }

    /// Run the scheduler loop, dispatching jobs as they come due, for up to
    /// `run_for`. `None` runs forever — the normal way this is driven in
    /// the daemon's main loop.
    pub async fn run(&self, dispatcher: &dyn JobDispatcher, run_for: Option<Duration>) {
        if self.jobs.is_empty() {
            return;
        }

        let started = Utc::now();
        let mut next = self.next_fire_times(started);

        loop {
            let now = Utc::now();
            if let Some(budget) = run_for {
                if (now - started).to_std().unwrap_or(Duration::ZERO) >= budget {
                    return;
                }
            }

            let Some((&due_id, &due_at)) = next.iter().min_by_key(|(_, at)| **at) else {
                return;
            };

            if due_at <= now {
                info!(job_id = due_id, "dispatching cron job");
                if let Err(err) = dispatcher.dispatch(due_id).await {
                    error!(job_id = due_id, error = %err, "cron job dispatch failed");
                }

                if let Some(job) = self.jobs.iter().find(|j| j.id == due_id) {
                    match job.schedule.after(&now).next() {
                        Some(at) => {
                            next.insert(due_id, at);
                        }
                        None => {
                            next.remove(due_id);
                        }
                    }
                }
            } else {
                let wait = (due_at - now).to_std().unwrap_or(Duration::from_millis(50));
                let wait = run_for.map_or(wait, |budget| {
                    let elapsed = (now - started).to_std().unwrap_or(Duration::ZERO);
                    wait.min(budget.saturating_sub(elapsed))
                });
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingDispatcher {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl JobDispatcher for CountingDispatcher {
        async fn dispatch(&self, _job_id: &str) -> anyhow::Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn five_field_crontab_is_adapted_with_a_leading_seconds_field() {
        assert!(parse_five_field_crontab("7 * * * *").is_ok());
        assert!(parse_five_field_crontab("5 6 * * sat").is_ok());
    }

    #[test]
    fn jobs_with_tag_filters_by_registered_tag() {
        let mut scheduler = Scheduler::new();
        scheduler.register("asana_incremental_backfill", "7 * * * *", vec!["asana"]).unwrap();
        scheduler.register("pylon_incremental_backfill", "*/15 * * * *", vec!["pylon"]).unwrap();

        let asana_jobs: Vec<_> = scheduler.jobs_with_tag("asana").collect();
        assert_eq!(asana_jobs.len(), 1);
        assert_eq!(asana_jobs[0].id, "asana_incremental_backfill");
    }

    #[tokio::test(start_paused = true)]
    async fn every_minute_job_dispatches_once_per_tick() {
        let mut scheduler = Scheduler::new();
        scheduler.register("every_minute", "* * * * *", vec![]).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = CountingDispatcher { count: count.clone() };

        scheduler.run(&dispatcher, Some(Duration::from_secs(150))).await;

        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}
