//! Inbound interface to the downstream indexing/agent layer.
//!
//! This crate only specifies the boundary: implementations (vector index,
//! keyword index, agent memory ingestion) live outside this workspace.

use crate::identity::{BackfillId, TenantId};
use async_trait::async_trait;

/// Callback invoked after a batch of entity ids has been durably upserted
/// into the artifact repository, so a downstream indexer can pick them up.
#[async_trait]
pub trait TriggerIndexing: Send + Sync {
    async fn trigger(
        &self,
        entity_ids: &[String],
        source: &str,
        tenant_id: TenantId,
        backfill_id: Option<BackfillId>,
        suppress_notification: bool,
    ) -> anyhow::Result<()>;
}

/// No-op implementation used by tests and by sources that only write
/// artifacts without a live downstream indexer configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTriggerIndexing;

#[async_trait]
impl TriggerIndexing for NullTriggerIndexing {
    async fn trigger(
        &self,
        _entity_ids: &[String],
        _source: &str,
        _tenant_id: TenantId,
        _backfill_id: Option<BackfillId>,
        _suppress_notification: bool,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
