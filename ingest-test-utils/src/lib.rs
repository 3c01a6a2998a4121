//! Shared test fixtures and proptest generators for the ingestion
//! workspace: one crate every other crate's `[dev-dependencies]` can
//! reach for instead of hand-rolling the same builders in every test
//! module.

pub use ingest_core::{
    Artifact, BackfillId, BillingTier, Chunk, ChunkId, DocumentId, EntityIdType, EntityKind,
    ExclusionRule, ExclusionRuleId, ExclusionRuleKind, IngestError, IngestResult,
    NullTriggerIndexing, PermissionPolicy, TenantId, TriggerIndexing, UsageMetric, UsageSource,
};

use chrono::Utc;

/// Build an [`Artifact`] with sane defaults, overriding only `entity` and
/// `entity_id`. `source_updated_at`/`created_at`/`updated_at` are all set
/// to the construction time, so a caller that needs to exercise the
/// monotonic upsert gate should overwrite `source_updated_at` explicitly.
pub fn artifact(tenant_id: TenantId, entity: EntityKind, entity_id: &str) -> Artifact {
    let now = Utc::now();
    Artifact {
        id: ingest_core::ArtifactId::now_v7(),
        tenant_id,
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

/// An [`ExclusionRule`] builder, active by default.
pub fn exclusion_rule(tenant_id: TenantId, kind: ExclusionRuleKind, pattern: &str) -> ExclusionRule {
    ExclusionRule {
        id: ExclusionRuleId::now_v7(),
        tenant_id,
        kind,
        pattern: pattern.to_string(),
        active: true,
    }
}

/// Proptest strategies for the entity-id and data-model types.
pub mod generators {
    use super::*;
    use ingest_core::ArtifactId;
    use proptest::prelude::*;

    /// Any of the four entity kinds with a full extractor (Asana, Pylon,
    /// generic tracker, custom data) — the kinds actually exercised in
    /// upsert/exclusion property tests. The reserved-for-later kinds
    /// (`GithubFile`, `SlackChannel`, ...) are deliberately excluded since
    /// nothing generates artifacts for them yet.
    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        prop_oneof![
            Just(EntityKind::AsanaTask),
            Just(EntityKind::PylonIssue),
            Just(EntityKind::TrackerTask),
            Just(EntityKind::CustomDataItem),
        ]
    }

    /// A short alphanumeric entity id, standing in for a source-native
    /// gid/issue-number/slug.
    pub fn arb_entity_id() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{1,12}"
    }

    /// A timestamp strategy bounded to a decade around the current epoch,
    /// wide enough to exercise billing-period and monotonic-upsert edge
    /// cases without drifting into chrono's representable-range limits.
    pub fn arb_timestamp() -> impl Strategy<Value = chrono::DateTime<Utc>> {
        (1_700_000_000i64..1_900_000_000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        Just(()).prop_map(|_| TenantId::now_v7())
    }

    /// An [`Artifact`] with a fixed `tenant_id`/`entity`/`entity_id` (the
    /// caller typically fixes these to hold an upsert key constant across
    /// a shrink run) but an arbitrary `source_updated_at` and content.
    pub fn arb_artifact(
        tenant_id: TenantId,
        entity: EntityKind,
        entity_id: String,
    ) -> impl Strategy<Value = Artifact> {
        (arb_timestamp(), any::<u32>()).prop_map(move |(source_updated_at, generation)| {
            let now = Utc::now();
            Artifact {
                id: ArtifactId::now_v7(),
                tenant_id,
                entity,
                entity_id: entity_id.clone(),
                source_updated_at,
                content: serde_json::json!({ "generation": generation }),
                metadata: serde_json::json!({}),
                last_seen_backfill_id: None,
                created_at: now,
                updated_at: now,
            }
        })
    }

    /// A billing anchor day, 1 through 31 inclusive (the valid range the
    /// monthly rollover clamps into for short months).
    pub fn arb_billing_anchor_day() -> impl Strategy<Value = u32> {
        1u32..=31
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn artifact_builder_fills_required_fields() {
        let tenant = TenantId::now_v7();
        let a = artifact(tenant, EntityKind::AsanaTask, "123");
        assert_eq!(a.tenant_id, tenant);
        assert_eq!(a.entity, EntityKind::AsanaTask);
        assert_eq!(a.entity_id, "123");
        assert!(a.last_seen_backfill_id.is_none());
    }

    #[test]
    fn exclusion_rule_builder_defaults_to_active() {
        let tenant = TenantId::now_v7();
        let rule = exclusion_rule(tenant, ExclusionRuleKind::GithubFile, "vendor/**");
        assert!(rule.active);
        assert_eq!(rule.pattern, "vendor/**");
    }

    proptest::proptest! {
        #[test]
        fn arb_timestamp_stays_within_its_declared_decade(ts in generators::arb_timestamp()) {
            prop_assert!(ts.timestamp() >= 1_700_000_000);
            prop_assert!(ts.timestamp() < 1_900_000_000);
        }

        #[test]
        fn arb_artifact_keeps_the_fixed_upsert_key(
            a in generators::arb_artifact(TenantId::nil(), EntityKind::PylonIssue, "gid-1".to_string())
        ) {
            prop_assert_eq!(a.tenant_id, TenantId::nil());
            prop_assert_eq!(a.entity, EntityKind::PylonIssue);
            prop_assert_eq!(a.entity_id, "gid-1");
        }
    }
}
