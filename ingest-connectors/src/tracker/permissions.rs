//! List-membership permission sweep, grounded on
//! `asana_permissions_backfill_extractor.py`'s `AllPermissionsBackfiller`
//! shape but deliberately without its dedup-and-skip cache: membership for
//! every list is force-upserted on every run, including lists whose
//! membership has not changed, so that each list's `last_seen_backfill_id`
//! is always refreshed by this sweep.

use ingest_artifacts::ArtifactRepository;
use ingest_core::{IngestResult, TenantId};
use std::sync::Arc;

use super::api::TrackerApi;
use super::artifacts::build_list_membership_artifact;
use super::full_backfill::list_all_lists;

/// Drives a full sweep of every list in the tenant's workspace, used by the
/// dedicated, lower-cadence permissions-only job. Unlike the Asana
/// permissions sweep, this unconditionally force-upserts every list's
/// membership snapshot rather than skipping lists already seen.
pub struct TrackerPermissionBackfiller {
    client: Arc<dyn TrackerApi>,
    db: Arc<dyn ArtifactRepository>,
    tenant_id: TenantId,
}

impl TrackerPermissionBackfiller {
    pub fn new(client: Arc<dyn TrackerApi>, db: Arc<dyn ArtifactRepository>, tenant_id: TenantId) -> Self {
        Self { client, db, tenant_id }
    }

    pub async fn backfill_all_permissions(&self) -> IngestResult<()> {
        let lists = list_all_lists(self.client.as_ref()).await?;

        let mut set = tokio::task::JoinSet::new();
        for list in lists {
            let client = self.client.clone();
            let db = self.db.clone();
            let tenant_id = self.tenant_id;
            set.spawn(async move { backfill_list_membership(client.as_ref(), db.as_ref(), tenant_id, &list).await });
        }

        while let Some(result) = set.join_next().await {
            result.map_err(|e| ingest_core::IngestError::Other(e.into()))??;
        }
        Ok(())
    }
}

async fn backfill_list_membership(
    client: &dyn TrackerApi,
    db: &dyn ArtifactRepository,
    tenant_id: TenantId,
    list: &super::wire::TrackerList,
) -> IngestResult<()> {
    let members = client.list_members(&list.id).await?;
    let artifact = build_list_membership_artifact(tenant_id, list, &members)?;

    tracing::info!(list_id = %list.id, list_name = %list.name, members_count = members.len(), "refreshing tracker list membership");

    db.force_upsert(&artifact).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_entity_id_is_scoped_to_the_list() {
        assert_eq!(super::super::artifacts::tracker_list_membership_entity_id("l1"), "tracker_list_membership_l1");
    }
}
