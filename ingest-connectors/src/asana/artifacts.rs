//! Asana artifact construction, grounded on
//! `asana_task_artifact.py`/`asana_story_artifact.py`/
//! `asana_project_artifact.py`/`asana_team_artifact.py`.

use chrono::{DateTime, Utc};
use ingest_core::{Artifact, ArtifactId, EntityIdType, EntityKind, IngestError, IngestResult, TenantId};
use serde::Serialize;

use super::wire::{AsanaProject, AsanaStory, AsanaTask, AsanaTeam, AsanaUser, AsanaWorkspace};

pub fn asana_task_entity_id(task_gid: &str) -> String {
    format!("asana_task_{task_gid}")
}

pub fn asana_story_entity_id(story_gid: &str) -> String {
    format!("asana_story_{story_gid}")
}

pub fn asana_project_permissions_entity_id(project_gid: &str) -> String {
    format!("asana_project_permissions_{project_gid}")
}

pub fn asana_team_permissions_entity_id(team_gid: &str) -> String {
    format!("asana_team_permissions_{team_gid}")
}

fn parse_iso(raw: &str) -> IngestResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IngestError::Other(e.into()))
}

#[derive(Debug, Clone, Serialize)]
struct AsanaTaskArtifactContent<'a> {
    task: &'a AsanaTask,
    workspace: &'a AsanaWorkspace,
}

pub fn build_task_artifact(tenant_id: TenantId, task: &AsanaTask, workspace: &AsanaWorkspace) -> IngestResult<Artifact> {
    let project_gids: Vec<&str> = task.memberships.iter().map(|m| m.project.gid.as_str()).collect();
    let section_gids: Vec<&str> = task.memberships.iter().map(|m| m.section.gid.as_str()).collect();
    let metadata = serde_json::json!({
        "task_gid": task.gid,
        "project_gids": project_gids,
        "section_gids": section_gids,
        "workspace_gid": workspace.gid,
        "created_at": task.created_at,
        "modified_at": task.modified_at,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::AsanaTask,
        entity_id: asana_task_entity_id(&task.gid),
        source_updated_at: parse_iso(&task.modified_at)?,
        content: serde_json::to_value(AsanaTaskArtifactContent { task, workspace })
            .map_err(|e| IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn build_story_artifact(tenant_id: TenantId, story: &AsanaStory, task_gid: &str) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "story_gid": story.gid,
        "task_gid": task_gid,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::AsanaTaskStory,
        entity_id: asana_story_entity_id(&story.gid),
        source_updated_at: parse_iso(&story.created_at)?,
        content: serde_json::to_value(story).map_err(|e| IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

/// A team together with its member users, the unit `AsanaPermissionBackfiller`
/// accumulates per project and persists as its own permissions artifact.
#[derive(Debug, Clone, Serialize)]
pub struct AsanaTeamWithUsers {
    pub team: AsanaTeam,
    pub users: Vec<AsanaUser>,
}

#[derive(Debug, Clone, Serialize)]
struct AsanaProjectPermissionsContent<'a> {
    project: &'a AsanaProject,
    users: &'a [AsanaUser],
    teams: &'a [AsanaTeamWithUsers],
}

/// Projects and teams carry no native updated-at to drive a monotonic
/// upsert, so permissions artifacts are always force-upserted with
/// `source_updated_at = now()`.
pub fn build_project_permissions_artifact(
    tenant_id: TenantId,
    workspace_gid: &str,
    project: &AsanaProject,
    users: &[AsanaUser],
    teams: &[AsanaTeamWithUsers],
) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "project_gid": project.gid,
        "workspace_gid": workspace_gid,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::AsanaProjectPermissions,
        entity_id: asana_project_permissions_entity_id(&project.gid),
        source_updated_at: now,
        content: serde_json::to_value(AsanaProjectPermissionsContent { project, users, teams })
            .map_err(|e| IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn build_team_permissions_artifact(
    tenant_id: TenantId,
    workspace_gid: &str,
    team_with_users: &AsanaTeamWithUsers,
) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "team_gid": team_with_users.team.gid,
        "workspace_gid": workspace_gid,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::AsanaTeamPermissions,
        entity_id: asana_team_permissions_entity_id(&team_with_users.team.gid),
        source_updated_at: now,
        content: serde_json::to_value(team_with_users).map_err(|e| IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

/// Merge the directly-listed project members with every accumulated team's
/// members, matching `AsanaProjectPermissionsArtifactContent.get_all_users`.
pub fn all_users<'a>(users: &'a [AsanaUser], teams: &'a [AsanaTeamWithUsers]) -> Vec<&'a AsanaUser> {
    let mut all: Vec<&AsanaUser> = users.iter().collect();
    for team in teams {
        all.extend(team.users.iter());
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_match_the_prefixed_convention() {
        assert_eq!(asana_task_entity_id("123"), "asana_task_123");
        assert_eq!(asana_story_entity_id("s1"), "asana_story_s1");
        assert_eq!(asana_project_permissions_entity_id("p1"), "asana_project_permissions_p1");
        assert_eq!(asana_team_permissions_entity_id("t1"), "asana_team_permissions_t1");
    }
}
