//! Hierarchical sub-fetches for a page of tasks: stories plus the
//! permission snapshots of every project the tasks belong to, grounded on
//! `asana_task_batch_backfiller.py`'s `AsanaTaskBatchBackfiller`.

use ingest_artifacts::ArtifactRepository;
use ingest_core::{Artifact, EntityKind, IngestResult};
use ingest_core::TenantId;
use std::collections::HashSet;
use std::sync::Arc;

use super::artifacts::{asana_task_entity_id, build_story_artifact, build_task_artifact};
use super::api::AsanaApi;
use super::permissions::AsanaPermissionBackfiller;
use super::wire::{AsanaProject, AsanaTask, AsanaWorkspace, NamedResource};

/// Artifacts produced for one page of tasks: the task artifacts themselves,
/// plus every secondary artifact (stories, permission snapshots) needed to
/// fully describe them.
#[derive(Debug, Clone, Default)]
pub struct TaskBatchArtifacts {
    pub task_artifacts: Vec<Artifact>,
    pub secondary_artifacts: Vec<Artifact>,
}

pub struct AsanaTaskBatchBackfiller {
    client: Arc<dyn AsanaApi>,
    db: Arc<dyn ArtifactRepository>,
    tenant_id: TenantId,
    permissions_backfiller: Arc<AsanaPermissionBackfiller<dyn ArtifactRepository>>,
}

impl AsanaTaskBatchBackfiller {
    /// The permissions backfiller dedupes against the tenant's own durable
    /// repository, not a standalone in-memory cache, matching the Python
    /// extractor's use of `db` as its permission cache during a task
    /// backfill -- as opposed to `AllPermissionsBackfiller`'s dedicated
    /// in-process cache for its own, separately-scheduled sweep.
    pub fn new(client: Arc<dyn AsanaApi>, db: Arc<dyn ArtifactRepository>, tenant_id: TenantId) -> Self {
        let permissions_backfiller =
            Arc::new(AsanaPermissionBackfiller::new(client.clone(), db.clone(), tenant_id));
        Self { client, db, tenant_id, permissions_backfiller }
    }

    /// Build task artifacts for `tasks`, deduping against stored content
    /// unless `refresh_tasks` is set, and fan out to backfill each task's
    /// stories and its projects' permissions.
    pub async fn get_artifacts(
        &self,
        workspace: &AsanaWorkspace,
        tasks: &[AsanaTask],
        refresh_tasks: bool,
    ) -> IngestResult<TaskBatchArtifacts> {
        let tasks_to_fetch: Vec<&AsanaTask> = if refresh_tasks {
            tasks.iter().collect()
        } else {
            let entity_ids: Vec<String> = tasks.iter().map(|t| asana_task_entity_id(&t.gid)).collect();
            let existing = self.db.get_by_entity_ids(EntityKind::AsanaTask, &entity_ids, None).await?;
            let existing_gids: HashSet<String> = existing.iter().map(|a| a.entity_id.clone()).collect();
            tasks.iter().filter(|t| !existing_gids.contains(&asana_task_entity_id(&t.gid))).collect()
        };

        let task_artifacts: Vec<Artifact> = tasks_to_fetch
            .iter()
            .map(|task| build_task_artifact(self.tenant_id, task, workspace))
            .collect::<IngestResult<_>>()?;

        // Task memberships only carry a named reference to each project, not
        // its privacy setting; permission derivation treats an unknown
        // setting as public, matching `AsanaProject::is_public`'s default.
        let projects = dedupe_asana_resources(
            tasks_to_fetch.iter().flat_map(|t| t.memberships.iter().map(|m| project_from_membership(&m.project))),
        );

        let mut set = tokio::task::JoinSet::new();

        let permissions_backfiller = self.permissions_backfiller.clone();
        let workspace_for_permissions = workspace.clone();
        set.spawn(async move {
            permissions_backfiller
                .backfill_projects_permissions(&workspace_for_permissions, &projects)
                .await
        });

        let story_task_gids: Vec<String> = tasks_to_fetch.iter().map(|t| t.gid.clone()).collect();
        for task_gid in story_task_gids {
            let client = self.client.clone();
            let tenant_id = self.tenant_id;
            set.spawn(async move { backfill_task_stories(client.as_ref(), tenant_id, &task_gid).await });
        }

        let mut secondary_artifacts = Vec::new();
        while let Some(result) = set.join_next().await {
            let artifacts = result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
            secondary_artifacts.extend(artifacts);
        }

        Ok(TaskBatchArtifacts { task_artifacts, secondary_artifacts })
    }
}

async fn backfill_task_stories(client: &dyn AsanaApi, tenant_id: TenantId, task_gid: &str) -> IngestResult<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    let mut offset: Option<String> = None;
    loop {
        let page = client.list_stories(task_gid, offset).await?;
        for story in &page.items {
            artifacts.push(build_story_artifact(tenant_id, story, task_gid)?);
        }
        offset = page.next;
        if offset.is_none() {
            break;
        }
    }
    Ok(artifacts)
}

fn project_from_membership(project: &NamedResource) -> AsanaProject {
    AsanaProject {
        gid: project.gid.clone(),
        name: project.name.clone(),
        privacy_setting: None,
        created_at: None,
        modified_at: None,
    }
}

/// Dedupe an iterator of project memberships by gid, preserving first-seen
/// order, mirroring `dedupe_asana_resources` in the Python extractor.
fn dedupe_asana_resources(projects: impl Iterator<Item = AsanaProject>) -> Vec<AsanaProject> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for project in projects {
        if seen.insert(project.gid.clone()) {
            out.push(project);
        }
    }
    out
}
