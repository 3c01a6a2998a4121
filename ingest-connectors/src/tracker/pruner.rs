//! Deletion of tasks (and their comments) the vendor reports as gone,
//! grounded on `asana_pruner.py`'s `AsanaPruner`.

use ingest_artifacts::{ArtifactRepository, MetadataFilter};
use ingest_core::{EntityKind, IngestResult};
use std::sync::Arc;

use super::artifacts::tracker_task_entity_id;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerPruneResult {
    pub tasks_deleted: u64,
    pub comments_deleted: u64,
}

pub struct TrackerPruner {
    db: Arc<dyn ArtifactRepository>,
}

impl TrackerPruner {
    pub fn new(db: Arc<dyn ArtifactRepository>) -> Self {
        Self { db }
    }

    /// Deletes the task artifacts for `task_ids` and every comment artifact
    /// filed under them.
    pub async fn prune_tasks_by_id(&self, task_ids: &[String]) -> IngestResult<TrackerPruneResult> {
        if task_ids.is_empty() {
            return Ok(TrackerPruneResult::default());
        }

        let task_entity_ids: Vec<String> = task_ids.iter().map(|id| tracker_task_entity_id(id)).collect();
        let tasks_deleted = self.db.delete_by_entity_ids(EntityKind::TrackerTask, &task_entity_ids).await?;

        let comment_filter = MetadataFilter::default().with_batch("task_id", task_ids.to_vec());
        let comments_deleted = self.db.delete_by_metadata(EntityKind::TrackerComment, &comment_filter).await?;

        tracing::info!(
            tasks_deleted,
            comments_deleted,
            task_count = task_ids.len(),
            "pruned deleted tracker tasks"
        );

        Ok(TrackerPruneResult { tasks_deleted, comments_deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_a_noop_result() {
        assert_eq!(TrackerPruneResult::default(), TrackerPruneResult { tasks_deleted: 0, comments_deleted: 0 });
    }
}
