//! Project and team permission snapshots, grounded on
//! `asana_permissions_backfiller.py`'s `AsanaPermissionBackfiller` and
//! `asana_permissions_backfill_extractor.py`'s `AllPermissionsBackfiller`.
//!
//! Permissions are cached and refreshed on a separate, slower cadence than
//! task content: a project or team already seen in this run (or, for the
//! dedicated weekly job, already seen by any earlier run) is skipped.

use async_trait::async_trait;
use ingest_artifacts::{ArtifactRepository, MemoryArtifactCache};
use ingest_core::{Artifact, EntityKind, IngestResult, TenantId};
use std::collections::HashSet;
use std::sync::Arc;

use super::api::AsanaApi;
use super::artifacts::{
    asana_project_permissions_entity_id, asana_team_permissions_entity_id,
    build_project_permissions_artifact, build_team_permissions_artifact, AsanaTeamWithUsers,
};
use super::wire::{AsanaProject, AsanaTeam, AsanaUser, AsanaWorkspace, MembershipMember};

/// Lookup-only view of stored artifacts, implemented both by a durable
/// [`ArtifactRepository`] (used within a single backfill run, where
/// permissions are persisted as they are discovered) and by a
/// [`MemoryArtifactCache`] (used by [`AllPermissionsBackfiller`], which
/// dedupes across an entire sweep before persisting anything).
#[async_trait]
pub trait ArtifactLookup: Send + Sync {
    async fn get_by_entity_ids(&self, entity: EntityKind, entity_ids: &[String]) -> IngestResult<Vec<Artifact>>;
}

#[async_trait]
impl<T: ArtifactRepository + ?Sized> ArtifactLookup for T {
    async fn get_by_entity_ids(&self, entity: EntityKind, entity_ids: &[String]) -> IngestResult<Vec<Artifact>> {
        ArtifactRepository::get_by_entity_ids(self, entity, entity_ids, None).await
    }
}

#[async_trait]
impl ArtifactLookup for MemoryArtifactCache {
    async fn get_by_entity_ids(&self, entity: EntityKind, entity_ids: &[String]) -> IngestResult<Vec<Artifact>> {
        Ok(MemoryArtifactCache::get_by_entity_ids(self, entity, entity_ids))
    }
}

fn team_with_users_from(artifact: &Artifact) -> IngestResult<AsanaTeamWithUsers> {
    serde_json::from_value(artifact.content.clone()).map_err(|e| ingest_core::IngestError::Other(e.into()))
}

fn project_gid_from_permissions_artifact(artifact: &Artifact) -> Option<String> {
    artifact.metadata.get("project_gid").and_then(|v| v.as_str()).map(str::to_string)
}

fn team_gid_from_permissions_artifact(artifact: &Artifact) -> Option<String> {
    artifact.metadata.get("team_gid").and_then(|v| v.as_str()).map(str::to_string)
}

pub struct AsanaPermissionBackfiller<C: ArtifactLookup + ?Sized> {
    client: Arc<dyn AsanaApi>,
    cache: Arc<C>,
    tenant_id: TenantId,
}

impl<C: ArtifactLookup + ?Sized + 'static> AsanaPermissionBackfiller<C> {
    pub fn new(client: Arc<dyn AsanaApi>, cache: Arc<C>, tenant_id: TenantId) -> Self {
        Self { client, cache, tenant_id }
    }

    /// Backfill permission artifacts for every project in `projects` that
    /// isn't already cached, returning the project (and any newly-seen
    /// team) permission artifacts produced.
    pub async fn backfill_projects_permissions(
        &self,
        workspace: &AsanaWorkspace,
        projects: &[AsanaProject],
    ) -> IngestResult<Vec<Artifact>> {
        let entity_ids: Vec<String> =
            projects.iter().map(|p| asana_project_permissions_entity_id(&p.gid)).collect();
        let existing = self.cache.get_by_entity_ids(EntityKind::AsanaProjectPermissions, &entity_ids).await?;
        let existing_gids: HashSet<String> =
            existing.iter().filter_map(project_gid_from_permissions_artifact).collect();

        let new_projects: Vec<AsanaProject> =
            projects.iter().filter(|p| !existing_gids.contains(&p.gid)).cloned().collect();

        tracing::info!(
            new_projects_count = new_projects.len(),
            existing_projects_count = existing_gids.len(),
            "backfilling permissions for new Asana projects"
        );

        let mut set = tokio::task::JoinSet::new();
        for project in new_projects {
            let client = self.client.clone();
            let cache = self.cache.clone();
            let workspace = workspace.clone();
            let tenant_id = self.tenant_id;
            set.spawn(async move {
                backfill_project_permissions(client.as_ref(), cache.as_ref(), tenant_id, &workspace, &project).await
            });
        }

        let mut out = Vec::new();
        while let Some(result) = set.join_next().await {
            let artifacts = result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
            out.extend(artifacts);
        }
        Ok(out)
    }
}

async fn backfill_project_permissions<C: ArtifactLookup + ?Sized>(
    client: &dyn AsanaApi,
    cache: &C,
    tenant_id: TenantId,
    workspace: &AsanaWorkspace,
    project: &AsanaProject,
) -> IngestResult<Vec<Artifact>> {
    let mut all_users: Vec<AsanaUser> = Vec::new();
    let mut all_existing_teams: Vec<AsanaTeamWithUsers> = Vec::new();
    let mut all_new_teams: Vec<AsanaTeamWithUsers> = Vec::new();

    let mut offset: Option<String> = None;
    loop {
        let page = client.list_project_memberships(&project.gid, offset).await?;

        let mut users = Vec::new();
        let mut teams = Vec::new();
        for membership in &page.items {
            match &membership.member {
                MembershipMember::User(user) => users.push(user.clone()),
                MembershipMember::Team(team) => teams.push(team.clone()),
            }
        }
        all_users.extend(users.iter().cloned());

        let team_entity_ids: Vec<String> =
            teams.iter().map(|t| asana_team_permissions_entity_id(&t.gid)).collect();
        let existing_team_artifacts =
            cache.get_by_entity_ids(EntityKind::AsanaTeamPermissions, &team_entity_ids).await?;
        let existing_teams: Vec<AsanaTeamWithUsers> =
            existing_team_artifacts.iter().filter_map(|a| team_with_users_from(a).ok()).collect();
        let existing_team_gids: HashSet<String> =
            existing_team_artifacts.iter().filter_map(team_gid_from_permissions_artifact).collect();
        all_existing_teams.extend(existing_teams);

        let new_teams: Vec<AsanaTeam> =
            teams.into_iter().filter(|t| !existing_team_gids.contains(&t.gid)).collect();

        tracing::info!(
            project_gid = %project.gid,
            project_name = %project.name,
            new_teams_count = new_teams.len(),
            existing_teams_count = existing_team_gids.len(),
            users_count = users.len(),
            "backfilling Asana project permissions (membership page)"
        );

        for team in new_teams {
            let with_users = backfill_team(client, &team).await?;
            all_new_teams.push(with_users);
        }

        offset = page.next;
        if offset.is_none() {
            break;
        }
    }

    let all_teams: Vec<AsanaTeamWithUsers> =
        all_existing_teams.into_iter().chain(all_new_teams.iter().cloned()).collect();

    let project_artifact =
        build_project_permissions_artifact(tenant_id, &workspace.gid, project, &all_users, &all_teams)?;

    let mut out = vec![project_artifact];
    for team in &all_new_teams {
        out.push(build_team_permissions_artifact(tenant_id, &workspace.gid, team)?);
    }
    Ok(out)
}

async fn backfill_team(client: &dyn AsanaApi, team: &AsanaTeam) -> IngestResult<AsanaTeamWithUsers> {
    let mut users = Vec::new();
    let mut offset: Option<String> = None;
    loop {
        let page = client.list_team_memberships(&team.gid, offset).await?;
        users.extend(page.items.into_iter().map(|m| m.user));
        offset = page.next;
        if offset.is_none() {
            break;
        }
    }
    Ok(AsanaTeamWithUsers { team: team.clone(), users })
}

/// Drives a full sweep of every workspace/project in the tenant, used by
/// the dedicated, lower-cadence permissions-only job
/// (`asana_permissions_backfill`). Dedupes against an in-process cache for
/// the duration of the sweep rather than the durable repository, matching
/// `AllPermissionsBackfiller`'s use of a fresh `MemoryArtifactCache`.
pub struct AllPermissionsBackfiller {
    client: Arc<dyn AsanaApi>,
    db: Arc<dyn ArtifactRepository>,
    tenant_id: TenantId,
}

impl AllPermissionsBackfiller {
    pub fn new(client: Arc<dyn AsanaApi>, db: Arc<dyn ArtifactRepository>, tenant_id: TenantId) -> Self {
        Self { client, db, tenant_id }
    }

    pub async fn backfill_all_permissions(&self) -> IngestResult<()> {
        let cache = Arc::new(MemoryArtifactCache::new());
        let backfiller =
            Arc::new(AsanaPermissionBackfiller::new(self.client.clone(), cache.clone(), self.tenant_id));

        let mut offset: Option<String> = None;
        let mut set = tokio::task::JoinSet::new();
        loop {
            let page = self.client.list_workspaces(offset).await?;
            for workspace in page.items {
                let db = self.db.clone();
                let cache = cache.clone();
                let backfiller = backfiller.clone();
                set.spawn(async move {
                    backfill_workspace_permissions(db.as_ref(), cache.as_ref(), &backfiller, &workspace).await
                });
            }
            offset = page.next;
            if offset.is_none() {
                break;
            }
        }

        while let Some(result) = set.join_next().await {
            result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
        }
        Ok(())
    }
}

async fn backfill_workspace_permissions(
    db: &dyn ArtifactRepository,
    cache: &MemoryArtifactCache,
    backfiller: &AsanaPermissionBackfiller<MemoryArtifactCache>,
    workspace: &AsanaWorkspace,
) -> IngestResult<()> {
    tracing::info!(workspace_gid = %workspace.gid, workspace_name = %workspace.name, "backfilling Asana workspace permissions");

    let mut offset: Option<String> = None;
    loop {
        let page = backfiller.client.list_projects(&workspace.gid, offset).await?;
        let artifacts = backfiller.backfill_projects_permissions(workspace, &page.items).await?;
        cache.add_batch(artifacts.clone());
        db.upsert_batch(&artifacts).await?;
        offset = page.next;
        if offset.is_none() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_entity_ids_extract_roundtrip() {
        let artifact_meta = serde_json::json!({ "project_gid": "p1", "workspace_gid": "w1" });
        assert_eq!(artifact_meta.get("project_gid").and_then(|v| v.as_str()), Some("p1"));
    }
}
