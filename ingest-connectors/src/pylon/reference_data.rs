//! Reference-data pre-sync (users, teams, accounts, contacts), grounded on
//! `pylon_full_backfill_extractor.py`'s `_sync_reference_data`.
//!
//! Synced once per 24-hour window so issue transformation has names to
//! attach to assignees/requesters/accounts without refetching them on every
//! issue backfill run.
//!
//! Each page is upserted as its own batch rather than re-chunked into a
//! fixed accumulation size, since Pylon's own page size already bounds a
//! single upsert statement.

use ingest_artifacts::ArtifactRepository;
use ingest_core::{IngestResult, TenantId};
use std::sync::Arc;

use super::api::PylonApi;
use super::artifacts::{build_account_artifact, build_contact_artifact, build_team_artifact, build_user_artifact};
use super::sync_state::PylonSyncState;

const REFERENCE_DATA_TTL_SECONDS: i64 = 24 * 60 * 60;

pub struct PylonReferenceData {
    client: Arc<dyn PylonApi>,
    db: Arc<dyn ArtifactRepository>,
    sync_state: Arc<PylonSyncState>,
    tenant_id: TenantId,
}

impl PylonReferenceData {
    pub fn new(
        client: Arc<dyn PylonApi>,
        db: Arc<dyn ArtifactRepository>,
        sync_state: Arc<PylonSyncState>,
        tenant_id: TenantId,
    ) -> Self {
        Self { client, db, sync_state, tenant_id }
    }

    /// Sync users/teams/accounts/contacts unless they were already synced
    /// within the last 24 hours.
    pub async fn sync_if_stale(&self) -> IngestResult<()> {
        if let Some(last_synced) = self.sync_state.reference_data_synced_at().await? {
            let age = chrono::Utc::now() - last_synced;
            if age.num_seconds() < REFERENCE_DATA_TTL_SECONDS {
                tracing::info!(last_synced = %last_synced, "skipping Pylon reference data sync, already synced recently");
                return Ok(());
            }
        }

        tracing::info!("syncing Pylon reference data (users, teams, accounts, contacts)");

        let users_count = self.sync_users().await?;
        let teams_count = self.sync_teams().await?;
        let accounts_count = self.sync_accounts().await?;
        let contacts_count = self.sync_contacts().await?;

        self.sync_state.set_reference_data_synced_at(chrono::Utc::now()).await?;

        tracing::info!(
            users_count,
            teams_count,
            accounts_count,
            contacts_count,
            "Pylon reference data sync complete"
        );
        Ok(())
    }

    async fn sync_users(&self) -> IngestResult<usize> {
        let mut cursor = None;
        let mut count = 0usize;
        loop {
            let page = self.client.list_users(cursor).await?;
            let artifacts: Vec<_> =
                page.items.iter().map(|u| build_user_artifact(self.tenant_id, u)).collect::<IngestResult<_>>()?;
            count += artifacts.len();
            if !artifacts.is_empty() {
                self.db.force_upsert_batch(&artifacts).await?;
            }
            cursor = page.next;
            if cursor.is_none() {
                break;
            }
        }
        tracing::info!(count, "synced Pylon users");
        Ok(count)
    }

    async fn sync_teams(&self) -> IngestResult<usize> {
        let mut cursor = None;
        let mut count = 0usize;
        loop {
            let page = self.client.list_teams(cursor).await?;
            let artifacts: Vec<_> =
                page.items.iter().map(|t| build_team_artifact(self.tenant_id, t)).collect::<IngestResult<_>>()?;
            count += artifacts.len();
            if !artifacts.is_empty() {
                self.db.force_upsert_batch(&artifacts).await?;
            }
            cursor = page.next;
            if cursor.is_none() {
                break;
            }
        }
        tracing::info!(count, "synced Pylon teams");
        Ok(count)
    }

    async fn sync_accounts(&self) -> IngestResult<usize> {
        let mut cursor = None;
        let mut count = 0usize;
        loop {
            let page = self.client.list_accounts(cursor).await?;
            let artifacts: Vec<_> =
                page.items.iter().map(|a| build_account_artifact(self.tenant_id, a)).collect::<IngestResult<_>>()?;
            count += artifacts.len();
            if !artifacts.is_empty() {
                self.db.force_upsert_batch(&artifacts).await?;
            }
            cursor = page.next;
            if cursor.is_none() {
                break;
            }
        }
        tracing::info!(count, "synced Pylon accounts");
        Ok(count)
    }

    async fn sync_contacts(&self) -> IngestResult<usize> {
        let mut cursor = None;
        let mut count = 0usize;
        loop {
            let page = self.client.list_contacts(cursor).await?;
            let artifacts: Vec<_> =
                page.items.iter().map(|c| build_contact_artifact(self.tenant_id, c)).collect::<IngestResult<_>>()?;
            count += artifacts.len();
            if !artifacts.is_empty() {
                self.db.force_upsert_batch(&artifacts).await?;
            }
            cursor = page.next;
            if cursor.is_none() {
                break;
            }
        }
        tracing::info!(count, "synced Pylon contacts");
        Ok(count)
    }
}
