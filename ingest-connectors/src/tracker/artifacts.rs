//! Tracker artifact construction, grounded on `pylon_artifacts.py`'s
//! plain-prefix entity-id convention and `asana_story_artifact.py` for the
//! nested-comment-artifact and force-upserted-membership-snapshot shapes.

use chrono::{DateTime, TimeZone, Utc};
use ingest_core::{Artifact, ArtifactId, EntityIdType, EntityKind, IngestError, IngestResult, TenantId};
use serde::Serialize;

use super::wire::{TrackerComment, TrackerList, TrackerTask, TrackerUser};

pub fn tracker_task_entity_id(task_id: &str) -> String {
    format!("tracker_task_{task_id}")
}

pub fn tracker_comment_entity_id(comment_id: &str) -> String {
    format!("tracker_comment_{comment_id}")
}

pub fn tracker_list_membership_entity_id(list_id: &str) -> String {
    format!("tracker_list_membership_{list_id}")
}

/// ClickUp timestamps are millisecond epoch strings rather than RFC3339.
fn parse_epoch_millis(raw: &str) -> IngestResult<DateTime<Utc>> {
    let millis: i64 = raw
        .parse()
        .map_err(|e| IngestError::Other(anyhow::anyhow!("invalid tracker timestamp {raw:?}: {e}")))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| IngestError::Other(anyhow::anyhow!("out-of-range tracker timestamp {millis}")))
}

#[derive(Debug, Clone, Serialize)]
struct TrackerTaskArtifactContent<'a> {
    task: &'a TrackerTask,
    list_id: &'a str,
}

/// Tasks carry a native `date_updated`, so they drive a genuine monotonic
/// upsert.
pub fn build_task_artifact(tenant_id: TenantId, task: &TrackerTask, list_id: &str) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "task_id": task.id,
        "list_id": list_id,
        "status": task.status.status,
        "assignee_ids": task.assignees.iter().map(|u| &u.id).collect::<Vec<_>>(),
        "date_created": task.date_created,
        "date_updated": task.date_updated,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::TrackerTask,
        entity_id: tracker_task_entity_id(&task.id),
        source_updated_at: parse_epoch_millis(&task.date_updated)?,
        content: serde_json::to_value(TrackerTaskArtifactContent { task, list_id })
            .map_err(|e| IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

#[derive(Debug, Clone, Serialize)]
struct TrackerCommentArtifactContent<'a> {
    comment: &'a TrackerComment,
    task_id: &'a str,
}

pub fn build_comment_artifact(
    tenant_id: TenantId,
    comment: &TrackerComment,
    task_id: &str,
) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "comment_id": comment.id,
        "task_id": task_id,
        "author_id": comment.user.as_ref().map(|u| &u.id),
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::TrackerComment,
        entity_id: tracker_comment_entity_id(&comment.id),
        source_updated_at: parse_epoch_millis(&comment.date)?,
        content: serde_json::to_value(TrackerCommentArtifactContent { comment, task_id })
            .map_err(|e| IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

#[derive(Debug, Clone, Serialize)]
struct TrackerListMembershipContent<'a> {
    list: &'a TrackerList,
    members: &'a [TrackerUser],
}

/// The tracker API exposes no native timestamp on list membership, so this
/// is always force-upserted with `source_updated_at = now()`, the same
/// reasoning `asana_project_artifact.py` applies to project permissions.
pub fn build_list_membership_artifact(
    tenant_id: TenantId,
    list: &TrackerList,
    members: &[TrackerUser],
) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "list_id": list.id,
        "space_id": list.space.as_ref().map(|s| &s.id),
        "member_ids": members.iter().map(|u| &u.id).collect::<Vec<_>>(),
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::TrackerListMembership,
        entity_id: tracker_list_membership_entity_id(&list.id),
        source_updated_at: now,
        content: serde_json::to_value(TrackerListMembershipContent { list, members })
            .map_err(|e| IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_match_the_prefixed_convention() {
        assert_eq!(tracker_task_entity_id("1"), "tracker_task_1");
        assert_eq!(tracker_comment_entity_id("2"), "tracker_comment_2");
        assert_eq!(tracker_list_membership_entity_id("3"), "tracker_list_membership_3");
    }

    #[test]
    fn parses_millisecond_epoch_timestamps() {
        let dt = parse_epoch_millis("1609459200000").unwrap();
        assert_eq!(dt.to_rfc3339(), "2021-01-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_non_numeric_timestamps() {
        assert!(parse_epoch_millis("not-a-number").is_err());
    }
}
