//! In-process artifact cache, grounded on the Python `MemoryArtifactCache`
//! class: a flat lookup keyed first by entity kind, then by entity id,
//! populated in batches ahead of a backfill run to avoid refetching
//! artifacts already seen earlier in the same run.

use ingest_core::{Artifact, EntityKind};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryArtifactCache {
    cache: RwLock<HashMap<EntityKind, HashMap<String, Artifact>>>,
}

impl MemoryArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&self, artifacts: impl IntoIterator<Item = Artifact>) {
        let mut cache = self.cache.write().expect("lock poisoned");
        for artifact in artifacts {
            cache
                .entry(artifact.entity)
                .or_default()
                .insert(artifact.entity_id.clone(), artifact);
        }
    }

    pub fn get_by_entity_ids(&self, entity: EntityKind, entity_ids: &[String]) -> Vec<Artifact> {
        let cache = self.cache.read().expect("lock poisoned");
        let Some(by_id) = cache.get(&entity) else { return Vec::new() };
        entity_ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply_exclusions, ArtifactRepository, MetadataFilter};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use ingest_core::{ArtifactId, EntityIdType, TenantId};
    use ingest_exclusion::ExclusionEngine;
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Pure in-process stand-in for [`crate::PgArtifactRepository`], used
    /// only to unit-test the monotonic-upsert invariant without a live
    /// Postgres: it reproduces the same strict-`<` gate the real
    /// repository enforces in SQL (see `postgres.rs::upsert_chunk`).
    #[derive(Default)]
    struct InMemoryArtifactRepository {
        rows: Mutex<HashMap<(EntityKind, String), Artifact>>,
    }

    #[async_trait]
    impl ArtifactRepository for InMemoryArtifactRepository {
        async fn upsert(&self, artifact: &Artifact) -> ingest_core::IngestResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let key = (artifact.entity, artifact.entity_id.clone());
            let replace = match rows.get(&key) {
                Some(existing) => artifact.supersedes(existing),
                None => true,
            };
            if replace {
                rows.insert(key, artifact.clone());
            }
            Ok(())
        }

        async fn force_upsert(&self, artifact: &Artifact) -> ingest_core::IngestResult<()> {
            let mut rows = self.rows.lock().unwrap();
            rows.insert((artifact.entity, artifact.entity_id.clone()), artifact.clone());
            Ok(())
        }

        async fn upsert_batch(&self, artifacts: &[Artifact]) -> ingest_core::IngestResult<()> {
            for artifact in artifacts {
                self.upsert(artifact).await?;
            }
            Ok(())
        }

        async fn force_upsert_batch(&self, artifacts: &[Artifact]) -> ingest_core::IngestResult<()> {
            for artifact in artifacts {
                self.force_upsert(artifact).await?;
            }
            Ok(())
        }

        async fn get_by_entity_ids(
            &self,
            entity: EntityKind,
            entity_ids: &[String],
            exclusion: Option<&ExclusionEngine>,
        ) -> ingest_core::IngestResult<Vec<Artifact>> {
            let rows = self.rows.lock().unwrap();
            let found: Vec<Artifact> =
                entity_ids.iter().filter_map(|id| rows.get(&(entity, id.clone())).cloned()).collect();
            Ok(apply_exclusions(entity, found, exclusion))
        }

        async fn get_by_metadata(
            &self,
            _entity: EntityKind,
            _filter: &MetadataFilter,
            _exclusion: Option<&ExclusionEngine>,
        ) -> ingest_core::IngestResult<Vec<Artifact>> {
            unimplemented!("not exercised by the monotonicity property test")
        }

        async fn delete_by_metadata(&self, _entity: EntityKind, _filter: &MetadataFilter) -> ingest_core::IngestResult<u64> {
            unimplemented!("not exercised by the monotonicity property test")
        }

        async fn delete_by_entity_ids(&self, entity: EntityKind, entity_ids: &[String]) -> ingest_core::IngestResult<u64> {
            let mut rows = self.rows.lock().unwrap();
            let mut deleted = 0u64;
            for id in entity_ids {
                if rows.remove(&(entity, id.clone())).is_some() {
                    deleted += 1;
                }
            }
            Ok(deleted)
        }
    }

    fn artifact(entity: EntityKind, entity_id: &str) -> Artifact {
        let now = Utc::now();
        Artifact {
            id: ArtifactId::now_v7(),
            tenant_id: TenantId::now_v7(),
            entity,
            entity_id: entity_id.to_string(),
            source_updated_at: now,
            content: serde_json::json!({}),
            metadata: serde_json::json!({}),
            last_seen_backfill_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fetches_only_known_ids_for_matching_entity_kind() {
        let cache = MemoryArtifactCache::new();
        cache.add_batch(vec![
            artifact(EntityKind::AsanaTask, "1"),
            artifact(EntityKind::AsanaTask, "2"),
            artifact(EntityKind::PylonIssue, "1"),
        ]);

        let found = cache.get_by_entity_ids(EntityKind::AsanaTask, &["1".into(), "3".into()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity_id, "1");
    }

    #[test]
    fn later_batch_overwrites_same_entity_id() {
        let cache = MemoryArtifactCache::new();
        let mut first = artifact(EntityKind::AsanaTask, "1");
        first.content = serde_json::json!({"v": 1});
        cache.add_batch(vec![first]);

        let mut second = artifact(EntityKind::AsanaTask, "1");
        second.content = serde_json::json!({"v": 2});
        cache.add_batch(vec![second]);

        let found = cache.get_by_entity_ids(EntityKind::AsanaTask, &["1".into()]);
        assert_eq!(found[0].content, serde_json::json!({"v": 2}));
    }

    // Testable property 1: upserting an artifact with `source_updated_at`
    // no greater than what's stored leaves the stored row unchanged.
    #[tokio::test]
    async fn monotonic_upsert_drops_non_newer_writes() {
        let repo = InMemoryArtifactRepository::default();
        let tenant = TenantId::now_v7();
        let base_time = Utc::now();

        let original = artifact_at(tenant, "123", base_time, serde_json::json!({"v": 1}));
        repo.upsert(&original).await.unwrap();

        let same_time = artifact_at(tenant, "123", base_time, serde_json::json!({"v": 2}));
        repo.upsert(&same_time).await.unwrap();
        let stored = repo.get_by_entity_ids(EntityKind::AsanaTask, &["123".into()], None).await.unwrap();
        assert_eq!(stored[0].content, serde_json::json!({"v": 1}), "tied timestamp must be a no-op");

        let older = artifact_at(tenant, "123", base_time - chrono::Duration::seconds(1), serde_json::json!({"v": 3}));
        repo.upsert(&older).await.unwrap();
        let stored = repo.get_by_entity_ids(EntityKind::AsanaTask, &["123".into()], None).await.unwrap();
        assert_eq!(stored[0].content, serde_json::json!({"v": 1}), "older write must be a no-op");

        let newer = artifact_at(tenant, "123", base_time + chrono::Duration::seconds(1), serde_json::json!({"v": 4}));
        repo.upsert(&newer).await.unwrap();
        let stored = repo.get_by_entity_ids(EntityKind::AsanaTask, &["123".into()], None).await.unwrap();
        assert_eq!(stored[0].content, serde_json::json!({"v": 4}), "strictly newer write must win");
    }

    #[tokio::test]
    async fn force_upsert_bypasses_the_monotonic_gate() {
        let repo = InMemoryArtifactRepository::default();
        let tenant = TenantId::now_v7();
        let base_time = Utc::now();

        let original = artifact_at(tenant, "123", base_time, serde_json::json!({"v": 1}));
        repo.upsert(&original).await.unwrap();

        let stale = artifact_at(tenant, "123", base_time - chrono::Duration::seconds(1), serde_json::json!({"v": 2}));
        repo.force_upsert(&stale).await.unwrap();

        let stored = repo.get_by_entity_ids(EntityKind::AsanaTask, &["123".into()], None).await.unwrap();
        assert_eq!(stored[0].content, serde_json::json!({"v": 2}));
    }

    fn artifact_at(tenant: TenantId, entity_id: &str, source_updated_at: chrono::DateTime<Utc>, content: serde_json::Value) -> Artifact {
        let mut a = artifact(EntityKind::AsanaTask, entity_id);
        a.tenant_id = tenant;
        a.source_updated_at = source_updated_at;
        a.content = content;
        a
    }

    proptest::proptest! {
        // Same property, swept over arbitrary timestamp deltas: an upsert
        // only ever replaces the stored row when its `source_updated_at`
        // is strictly greater.
        #[test]
        fn monotonic_upsert_never_regresses(delta_seconds in -1000i64..1000) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let repo = InMemoryArtifactRepository::default();
                let tenant = TenantId::now_v7();
                let base_time = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

                let original = artifact_at(tenant, "x", base_time, serde_json::json!({"gen": 0}));
                repo.upsert(&original).await.unwrap();

                let candidate_time = base_time + chrono::Duration::seconds(delta_seconds);
                let candidate = artifact_at(tenant, "x", candidate_time, serde_json::json!({"gen": 1}));
                repo.upsert(&candidate).await.unwrap();

                let stored = repo.get_by_entity_ids(EntityKind::AsanaTask, &["x".into()], None).await.unwrap();
                let expected_gen = if delta_seconds > 0 { 1 } else { 0 };
                prop_assert_eq!(stored[0].content["gen"], expected_gen);
                Ok(())
            })?;
        }
    }
}
