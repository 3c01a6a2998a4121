//! Deletion of tasks (and their stories) that the vendor reports as gone,
//! grounded on `asana_pruner.py`'s `AsanaPruner`.
//!
//! The Python pruner also deletes downstream rendered documents derived
//! from a task; this workspace has no document persistence layer, so
//! pruning here is scoped to artifacts only.

use ingest_artifacts::{ArtifactRepository, MetadataFilter};
use ingest_core::{EntityKind, IngestResult};
use std::sync::Arc;

use super::artifacts::asana_task_entity_id;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsanaPruneResult {
    pub tasks_deleted: u64,
    pub stories_deleted: u64,
}

pub struct AsanaPruner {
    db: Arc<dyn ArtifactRepository>,
}

impl AsanaPruner {
    pub fn new(db: Arc<dyn ArtifactRepository>) -> Self {
        Self { db }
    }

    /// Deletes the task artifacts for `task_gids` and every story artifact
    /// filed under them.
    pub async fn prune_tasks_by_gid(&self, task_gids: &[String]) -> IngestResult<AsanaPruneResult> {
        if task_gids.is_empty() {
            return Ok(AsanaPruneResult::default());
        }

        let task_entity_ids: Vec<String> = task_gids.iter().map(|gid| asana_task_entity_id(gid)).collect();
        let tasks_deleted = self.db.delete_by_entity_ids(EntityKind::AsanaTask, &task_entity_ids).await?;

        let story_filter = MetadataFilter::default().with_batch("task_gid", task_gids.to_vec());
        let stories_deleted = self.db.delete_by_metadata(EntityKind::AsanaTaskStory, &story_filter).await?;

        tracing::info!(
            tasks_deleted,
            stories_deleted,
            task_count = task_gids.len(),
            "pruned deleted Asana tasks"
        );

        Ok(AsanaPruneResult { tasks_deleted, stories_deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_a_noop_result() {
        assert_eq!(AsanaPruneResult::default(), AsanaPruneResult { tasks_deleted: 0, stories_deleted: 0 });
    }
}
