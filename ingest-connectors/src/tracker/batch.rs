//! Per-page comment fan-out for a batch of tasks, grounded on
//! `asana_task_batch_backfiller.py`'s `AsanaTaskBatchBackfiller` — list
//! membership has no per-task relevance here (it is swept on its own
//! cadence by [`super::permissions`]), so this backfiller only needs to
//! fan out each task's comments.

use ingest_artifacts::ArtifactRepository;
use ingest_core::{Artifact, IngestResult, TenantId};
use std::sync::Arc;

use super::api::TrackerApi;
use super::artifacts::{build_comment_artifact, build_task_artifact};
use super::wire::TrackerTask;

/// Artifacts produced for one page of tasks: the task artifacts themselves,
/// plus every comment artifact filed under them.
#[derive(Debug, Clone, Default)]
pub struct TaskBatchArtifacts {
    pub task_artifacts: Vec<Artifact>,
    pub secondary_artifacts: Vec<Artifact>,
}

pub struct TrackerTaskBatchBackfiller {
    client: Arc<dyn TrackerApi>,
    #[allow(dead_code)]
    db: Arc<dyn ArtifactRepository>,
    tenant_id: TenantId,
}

impl TrackerTaskBatchBackfiller {
    pub fn new(client: Arc<dyn TrackerApi>, db: Arc<dyn ArtifactRepository>, tenant_id: TenantId) -> Self {
        Self { client, db, tenant_id }
    }

    pub async fn get_artifacts(&self, tasks: &[TrackerTask], list_id: &str) -> IngestResult<TaskBatchArtifacts> {
        let task_artifacts: Vec<Artifact> =
            tasks.iter().map(|task| build_task_artifact(self.tenant_id, task, list_id)).collect::<IngestResult<_>>()?;

        let mut set = tokio::task::JoinSet::new();
        for task in tasks {
            let client = self.client.clone();
            let tenant_id = self.tenant_id;
            let task_id = task.id.clone();
            set.spawn(async move { backfill_task_comments(client.as_ref(), tenant_id, &task_id).await });
        }

        let mut secondary_artifacts = Vec::new();
        while let Some(result) = set.join_next().await {
            let artifacts = result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
            secondary_artifacts.extend(artifacts);
        }

        Ok(TaskBatchArtifacts { task_artifacts, secondary_artifacts })
    }
}

async fn backfill_task_comments(client: &dyn TrackerApi, tenant_id: TenantId, task_id: &str) -> IngestResult<Vec<Artifact>> {
    let comments = client.list_comments(task_id).await?;
    comments.iter().map(|comment| build_comment_artifact(tenant_id, comment, task_id)).collect()
}
