//! Incremental task backfill, grounded on
//! `asana_incr_backfill_extractor.py`'s `IncrBackfiller`.
//!
//! Each workspace is synced via its events feed when possible. An expired or
//! missing sync token falls back to a ten-minute search window; a
//! service-account-only token steps down to per-project event syncing,
//! which applies the same two strategies one level lower.

use chrono::{Duration, Utc};
use ingest_artifacts::ArtifactRepository;
use ingest_client::VendorError;
use ingest_core::{BackfillId, IngestResult, TenantId, TriggerIndexing};
use std::collections::HashSet;
use std::sync::Arc;

use super::api::{AsanaApi, EventPage};
use super::batch::AsanaTaskBatchBackfiller;
use super::pruner::AsanaPruner;
use super::sync_state::AsanaSyncState;
use super::wire::{AsanaEvent, AsanaEventParent, AsanaProject, AsanaTask, AsanaWorkspace, IdentifiedResource};

const ASANA_TASK_SOURCE: &str = "asana_task";
const SEARCH_FALLBACK_WINDOW_MINUTES: i64 = 10;

#[derive(Debug, Clone, Default)]
struct EventPageResult {
    added_task_gids: HashSet<String>,
    deleted_task_gids: HashSet<String>,
    updated_task_gids: HashSet<String>,
}

pub struct IncrBackfiller {
    client: Arc<dyn AsanaApi>,
    db: Arc<dyn ArtifactRepository>,
    sync_state: Arc<AsanaSyncState>,
    trigger_indexing: Arc<dyn TriggerIndexing>,
    tenant_id: TenantId,
    backfill_id: BackfillId,
    suppress_notification: bool,
    task_batch_backfiller: Arc<AsanaTaskBatchBackfiller>,
    pruner: Arc<AsanaPruner>,
}

impl IncrBackfiller {
    pub fn new(
        client: Arc<dyn AsanaApi>,
        db: Arc<dyn ArtifactRepository>,
        sync_state: Arc<AsanaSyncState>,
        trigger_indexing: Arc<dyn TriggerIndexing>,
        tenant_id: TenantId,
        backfill_id: BackfillId,
        suppress_notification: bool,
    ) -> Self {
        let task_batch_backfiller = Arc::new(AsanaTaskBatchBackfiller::new(client.clone(), db.clone(), tenant_id));
        let pruner = Arc::new(AsanaPruner::new(db.clone()));
        Self {
            client,
            db,
            sync_state,
            trigger_indexing,
            tenant_id,
            backfill_id,
            suppress_notification,
            task_batch_backfiller,
            pruner,
        }
    }

    pub async fn backfill_workspaces(&self) -> IngestResult<()> {
        let mut offset: Option<String> = None;
        let mut set = tokio::task::JoinSet::new();
        loop {
            let page = self.client.list_workspaces(offset).await?;
            for workspace in page.items {
                let this = self.clone_handles();
                set.spawn(async move { this.backfill_workspace(&workspace).await });
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

    fn clone_handles(&self) -> Arc<Self> {
        Arc::new(Self {
            client: self.client.clone(),
            db: self.db.clone(),
            sync_state: self.sync_state.clone(),
            trigger_indexing: self.trigger_indexing.clone(),
            tenant_id: self.tenant_id,
            backfill_id: self.backfill_id,
            suppress_notification: self.suppress_notification,
            task_batch_backfiller: self.task_batch_backfiller.clone(),
            pruner: self.pruner.clone(),
        })
    }

    async fn backfill_workspace(&self, workspace: &AsanaWorkspace) -> IngestResult<()> {
        tracing::info!(workspace_gid = %workspace.gid, workspace_name = %workspace.name, "backfilling Asana workspace (incremental)");

        let workspace_sync_token = self.sync_state.incr_workspace_sync_token(&workspace.gid).await?;

        match fetch_all_events(|token| self.client.list_workspace_events(&workspace.gid, token), workspace_sync_token.as_deref()).await {
            Ok((events, final_sync_token)) => {
                self.handle_events(workspace, events).await?;
                if let Some(token) = final_sync_token {
                    self.sync_state.set_incr_workspace_sync_token(&workspace.gid, Some(&token)).await?;
                }
            }
            Err(VendorError::InvalidSyncToken { fresh_sync_token }) => {
                tracing::info!(
                    workspace_gid = %workspace.gid,
                    "workspace events sync token invalid or expired, falling back to last 10 minutes via search api"
                );
                self.sync_state.set_incr_workspace_sync_token(&workspace.gid, fresh_sync_token.as_deref()).await?;
                self.backfill_workspace_via_search(workspace, None).await?;
            }
            Err(VendorError::ServiceAccountOnly(_)) => {
                tracing::info!(
                    workspace_gid = %workspace.gid,
                    "workspace events not accessible with OAuth token, falling back to project-level incremental backfill"
                );
                self.backfill_projects(workspace).await?;
            }
            Err(other) => return Err(other.into()),
        }
        Ok(())
    }

    async fn backfill_projects(&self, workspace: &AsanaWorkspace) -> IngestResult<()> {
        let mut offset: Option<String> = None;
        let mut set = tokio::task::JoinSet::new();
        loop {
            let page = self.client.list_projects(&workspace.gid, offset).await?;
            for project in page.items {
                let this = self.clone_handles();
                let workspace = workspace.clone();
                set.spawn(async move { this.backfill_project(&workspace, &project).await });
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

    async fn backfill_project(&self, workspace: &AsanaWorkspace, project: &AsanaProject) -> IngestResult<()> {
        tracing::info!(
            workspace_gid = %workspace.gid,
            project_gid = %project.gid,
            project_name = %project.name,
            "backfilling Asana project (incremental)"
        );

        let project_sync_token = self.sync_state.incr_project_sync_token(&project.gid).await?;

        match fetch_all_events(|token| self.client.list_project_events(&project.gid, token), project_sync_token.as_deref()).await {
            Ok((events, final_sync_token)) => {
                self.handle_events(workspace, events).await?;
                if let Some(token) = final_sync_token {
                    self.sync_state.set_incr_project_sync_token(&project.gid, Some(&token)).await?;
                }
            }
            Err(VendorError::InvalidSyncToken { fresh_sync_token }) => {
                tracing::info!(project_gid = %project.gid, "project events sync token invalid or expired, falling back to last 10 minutes via search api");
                self.sync_state.set_incr_project_sync_token(&project.gid, fresh_sync_token.as_deref()).await?;
                self.backfill_workspace_via_search(workspace, Some(&project.gid)).await?;
            }
            Err(other) => return Err(other.into()),
        }
        Ok(())
    }

    async fn backfill_workspace_via_search(&self, workspace: &AsanaWorkspace, project_gid: Option<&str>) -> IngestResult<()> {
        let modified_at_after = Utc::now() - Duration::minutes(SEARCH_FALLBACK_WINDOW_MINUTES);
        let tasks = self.client.search_tasks(&workspace.gid, Utc::now(), Some(modified_at_after), project_gid).await?;
        if !tasks.is_empty() {
            self.handle_task_page(workspace, &tasks).await?;
        }
        Ok(())
    }

    async fn handle_events(&self, workspace: &AsanaWorkspace, events: Vec<AsanaEvent>) -> IngestResult<()> {
        let result = process_events(&events);

        let added_and_deleted: HashSet<String> =
            result.added_task_gids.intersection(&result.deleted_task_gids).cloned().collect();
        let refresh_gids: Vec<String> = result
            .added_task_gids
            .union(&result.updated_task_gids)
            .filter(|gid| !added_and_deleted.contains(*gid))
            .cloned()
            .collect();
        let delete_gids: Vec<String> =
            result.deleted_task_gids.difference(&added_and_deleted).cloned().collect();

        let mut set = tokio::task::JoinSet::new();
        if !refresh_gids.is_empty() {
            let this = self.clone_handles();
            let workspace = workspace.clone();
            set.spawn(async move {
                this.refresh_tasks(&workspace, &refresh_gids).await?;
                Ok::<(), ingest_core::IngestError>(())
            });
        }
        if !delete_gids.is_empty() {
            let pruner = self.pruner.clone();
            set.spawn(async move {
                pruner.prune_tasks_by_gid(&delete_gids).await?;
                Ok(())
            });
        }

        while let Some(result) = set.join_next().await {
            result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
        }
        Ok(())
    }

    async fn handle_task_page(&self, workspace: &AsanaWorkspace, tasks: &[AsanaTask]) -> IngestResult<()> {
        let batch = self.task_batch_backfiller.get_artifacts(workspace, tasks, true).await?;

        let mut all_artifacts = batch.task_artifacts.clone();
        all_artifacts.extend(batch.secondary_artifacts);
        self.db.upsert_batch(&all_artifacts).await?;

        let task_entity_ids: Vec<String> = batch.task_artifacts.iter().map(|a| a.entity_id.clone()).collect();
        if !task_entity_ids.is_empty() {
            self.trigger_indexing
                .trigger(
                    &task_entity_ids,
                    ASANA_TASK_SOURCE,
                    self.tenant_id,
                    Some(self.backfill_id),
                    self.suppress_notification,
                )
                .await
                .map_err(ingest_core::IngestError::Other)?;
        }
        Ok(())
    }

    async fn refresh_tasks(&self, workspace: &AsanaWorkspace, task_gids: &[String]) -> IngestResult<()> {
        let tasks = self.get_tasks_by_gid(task_gids).await?;
        self.handle_task_page(workspace, &tasks).await
    }

    async fn get_tasks_by_gid(&self, gids: &[String]) -> IngestResult<Vec<AsanaTask>> {
        let mut set = tokio::task::JoinSet::new();
        for gid in gids.iter().cloned() {
            let client = self.client.clone();
            set.spawn(async move { get_task_by_gid_fallible(client.as_ref(), &gid).await });
        }

        let mut tasks = Vec::new();
        while let Some(result) = set.join_next().await {
            let maybe_task = result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
            if let Some(task) = maybe_task {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }
}

/// A task that was both added and deleted by the time we try to fetch it is
/// best-effort: incremental syncing never blocks the whole job on a single
/// vanished entity.
async fn get_task_by_gid_fallible(client: &dyn AsanaApi, gid: &str) -> IngestResult<Option<AsanaTask>> {
    match client.get_task(gid).await {
        Ok(task) => Ok(Some(task)),
        Err(ingest_core::IngestError::NotFoundOrForbidden { .. }) => {
            tracing::warn!(task_gid = %gid, "Asana task not found or forbidden (may have been deleted)");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Drain an events feed to exhaustion, following `has_more` with the
/// previous page's returned `sync` token as the next request's cursor.
async fn fetch_all_events<F, Fut>(
    mut fetch: F,
    initial_token: Option<&str>,
) -> Result<(Vec<AsanaEvent>, Option<String>), VendorError>
where
    F: FnMut(Option<&str>) -> Fut,
    Fut: std::future::Future<Output = Result<EventPage, VendorError>>,
{
    let mut token = initial_token.map(str::to_string);
    let mut all_events = Vec::new();
    let mut final_sync = None;

    loop {
        let page = fetch(token.as_deref()).await?;
        all_events.extend(page.events);
        final_sync = Some(page.sync.clone());
        if !page.has_more {
            break;
        }
        token = Some(page.sync);
    }

    Ok((all_events, final_sync))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_event(action: &str, gid: &str) -> AsanaEvent {
        AsanaEvent {
            event_type: "task".into(),
            action: action.into(),
            parent: None,
            resource: IdentifiedResource { gid: gid.into(), resource_type: Some("task".into()) },
        }
    }

    fn task_event_with_parent(action: &str, gid: &str, parent_gid: &str) -> AsanaEvent {
        AsanaEvent {
            event_type: "task".into(),
            action: action.into(),
            parent: Some(AsanaEventParent { gid: Some(parent_gid.into()), resource_type: Some("task".into()) }),
            resource: IdentifiedResource { gid: gid.into(), resource_type: Some("task".into()) },
        }
    }

    fn refresh_and_delete(events: &[AsanaEvent]) -> (HashSet<String>, HashSet<String>) {
        let result = process_events(events);
        let added_and_deleted: HashSet<String> =
            result.added_task_gids.intersection(&result.deleted_task_gids).cloned().collect();
        let refresh: HashSet<String> = result
            .added_task_gids
            .union(&result.updated_task_gids)
            .filter(|gid| !added_and_deleted.contains(*gid))
            .cloned()
            .collect();
        let delete: HashSet<String> = result.deleted_task_gids.difference(&added_and_deleted).cloned().collect();
        (refresh, delete)
    }

    #[test]
    fn added_then_deleted_nets_out_of_both_refresh_and_delete() {
        // events: added=[A,B], changed=[B,C], deleted=[B,D]
        let events = vec![
            task_event("added", "A"),
            task_event("added", "B"),
            task_event("changed", "B"),
            task_event("changed", "C"),
            task_event("deleted", "B"),
            task_event("deleted", "D"),
        ];
        let (refresh, delete) = refresh_and_delete(&events);
        assert_eq!(refresh, HashSet::from(["C".to_string()]));
        assert_eq!(delete, HashSet::from(["D".to_string()]));
    }

    #[test]
    fn parent_of_a_changed_subtask_is_merged_into_refresh() {
        let events = vec![task_event_with_parent("changed", "story-1", "P")];
        let (refresh, delete) = refresh_and_delete(&events);
        assert_eq!(refresh, HashSet::from(["P".to_string()]));
        assert!(delete.is_empty());
    }

    #[test]
    fn non_task_events_are_ignored() {
        let events = vec![AsanaEvent {
            event_type: "project".into(),
            action: "changed".into(),
            parent: None,
            resource: IdentifiedResource { gid: "proj-1".into(), resource_type: Some("project".into()) },
        }];
        let result = process_events(&events);
        assert!(result.added_task_gids.is_empty());
        assert!(result.updated_task_gids.is_empty());
        assert!(result.deleted_task_gids.is_empty());
    }
}

/// `refresh = (added ∪ changed ∪ parent-of-change) - (added ∩ deleted)`,
/// `delete = deleted - (added ∩ deleted)`. Computed by the caller from this
/// page's raw sets so the "added then deleted within the same page" case
/// nets out to neither a refresh nor a delete.
fn process_events(events: &[AsanaEvent]) -> EventPageResult {
    let mut result = EventPageResult::default();

    for event in events {
        let is_task = event.resource.resource_type.as_deref() == Some("task");
        if is_task && event.action == "deleted" {
            result.deleted_task_gids.insert(event.resource.gid.clone());
        } else if is_task && event.action == "added" {
            result.added_task_gids.insert(event.resource.gid.clone());
        } else if is_task {
            result.updated_task_gids.insert(event.resource.gid.clone());
        }

        if let Some(parent) = &event.parent {
            if parent.resource_type.as_deref() == Some("task") {
                if let Some(gid) = &parent.gid {
                    result.updated_task_gids.insert(gid.clone());
                }
            }
        }
    }

    tracing::info!(
        added_task_count = result.added_task_gids.len(),
        deleted_task_count = result.deleted_task_gids.len(),
        updated_task_count = result.updated_task_gids.len(),
        total_events = events.len(),
        "processed Asana event page"
    );

    result
}
