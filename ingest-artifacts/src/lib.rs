//! Typed storage for raw artifacts under the monotonic-upsert invariant,
//! grounded directly on
//! `original_source/src/ingest/repositories/artifact_repository.py`.

mod filter;
mod memory;
mod postgres;

pub use filter::MetadataFilter;
pub use memory::MemoryArtifactCache;
pub use postgres::PgArtifactRepository;

use async_trait::async_trait;
use ingest_core::{Artifact, EntityKind, IngestResult};
use ingest_exclusion::ExclusionEngine;

/// Storage and query operations over raw artifacts.
///
/// `upsert`/`upsert_batch` only replace stored content when the incoming
/// `source_updated_at` is strictly greater than what is stored (see
/// `Artifact::supersedes`). `force_upsert`/`force_upsert_batch` bypass that
/// check entirely — used for metadata-only refreshes (e.g. permission
/// resyncs) where the source does not bump its own updated-at.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    async fn upsert(&self, artifact: &Artifact) -> IngestResult<()>;

    async fn force_upsert(&self, artifact: &Artifact) -> IngestResult<()>;

    async fn upsert_batch(&self, artifacts: &[Artifact]) -> IngestResult<()>;

    async fn force_upsert_batch(&self, artifacts: &[Artifact]) -> IngestResult<()>;

    /// Fetch artifacts of `entity` by their source-native entity ids.
    /// `exclusion` is applied post-read when supplied, matching the
    /// original's `apply_exclusions` default of `true` (callers that want
    /// the original's `apply_exclusions=False` pass `None`).
    async fn get_by_entity_ids(
        &self,
        entity: EntityKind,
        entity_ids: &[String],
        exclusion: Option<&ExclusionEngine>,
    ) -> IngestResult<Vec<Artifact>>;

    async fn get_by_metadata(
        &self,
        entity: EntityKind,
        filter: &MetadataFilter,
        exclusion: Option<&ExclusionEngine>,
    ) -> IngestResult<Vec<Artifact>>;

    /// Returns the number of rows deleted.
    async fn delete_by_metadata(&self, entity: EntityKind, filter: &MetadataFilter) -> IngestResult<u64>;

    /// Returns the number of rows deleted.
    async fn delete_by_entity_ids(&self, entity: EntityKind, entity_ids: &[String]) -> IngestResult<u64>;
}

/// Apply post-read exclusion filtering, logging how many artifacts were
/// dropped (mirrors `ArtifactRepository._exclude_artifacts`'s summary log).
pub(crate) fn apply_exclusions(
    entity: EntityKind,
    artifacts: Vec<Artifact>,
    exclusion: Option<&ExclusionEngine>,
) -> Vec<Artifact> {
    let Some(engine) = exclusion else { return artifacts };
    let Some(rule_kind) = ingest_core::ExclusionRuleKind::for_entity(entity) else {
        return artifacts;
    };

    let total = artifacts.len();
    let filtered: Vec<Artifact> = artifacts
        .into_iter()
        .filter(|artifact| !engine.should_exclude(&artifact.entity_id, rule_kind))
        .collect();

    let excluded = total - filtered.len();
    if excluded > 0 {
        tracing::info!(excluded, total, "excluded artifacts based on exclusion rules");
    }
    filtered
}
