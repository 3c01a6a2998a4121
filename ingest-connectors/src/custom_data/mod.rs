//! Custom Data connector, grounded on
//! `custom_data_ingest_extractor.py`'s `CustomDataIngestExtractor`.
//!
//! Unlike the other connectors, documents arrive directly in the work
//! queue message rather than being fetched from an external API: this
//! extractor only converts the payload into artifacts and triggers
//! indexing.

use ingest_artifacts::ArtifactRepository;
use ingest_core::{Artifact, ArtifactId, EntityIdType, EntityKind, IngestResult, TenantId, TriggerIndexing};
use ingest_queue::CustomDataDocumentPayload;
use std::sync::Arc;

const CUSTOM_DATA_SOURCE: &str = "custom_data";

pub fn custom_data_entity_id(slug: &str, item_id: &str) -> String {
    format!("{slug}::{item_id}")
}

fn build_document_artifact(
    tenant_id: TenantId,
    slug: &str,
    doc: &CustomDataDocumentPayload,
    now: chrono::DateTime<chrono::Utc>,
) -> Artifact {
    let content = serde_json::json!({ "content": doc.content });

    let mut metadata = serde_json::json!({
        "name": doc.name,
        "description": doc.description,
        "slug": slug,
        "item_id": doc.id,
    });
    if let Some(serde_json::Value::Object(custom_fields)) = &doc.custom_fields {
        if let Some(metadata) = metadata.as_object_mut() {
            for (key, value) in custom_fields {
                metadata.insert(key.clone(), value.clone());
            }
        }
    }

    Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::CustomDataItem,
        entity_id: custom_data_entity_id(slug, &doc.id),
        source_updated_at: now,
        content,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub struct CustomDataIngestor {
    db: Arc<dyn ArtifactRepository>,
    trigger_indexing: Arc<dyn TriggerIndexing>,
}

impl CustomDataIngestor {
    pub fn new(db: Arc<dyn ArtifactRepository>, trigger_indexing: Arc<dyn TriggerIndexing>) -> Self {
        Self { db, trigger_indexing }
    }

    pub async fn ingest(
        &self,
        tenant_id: TenantId,
        slug: &str,
        documents: &[CustomDataDocumentPayload],
        backfill_id: Option<ingest_core::BackfillId>,
        suppress_notification: bool,
    ) -> IngestResult<()> {
        tracing::info!(slug, document_count = documents.len(), "processing custom data ingest job");

        if documents.is_empty() {
            tracing::info!("no custom data documents to process");
            return Ok(());
        }

        let now = chrono::Utc::now();
        let artifacts: Vec<Artifact> =
            documents.iter().map(|doc| build_document_artifact(tenant_id, slug, doc, now)).collect();

        self.db.force_upsert_batch(&artifacts).await?;

        let entity_ids: Vec<String> = artifacts.iter().map(|a| a.entity_id.clone()).collect();
        tracing::info!(slug, entity_count = entity_ids.len(), "stored custom data artifacts");

        self.trigger_indexing
            .trigger(&entity_ids, CUSTOM_DATA_SOURCE, tenant_id, backfill_id, suppress_notification)
            .await
            .map_err(ingest_core::IngestError::Other)?;

        tracing::info!(slug, entity_count = entity_ids.len(), "triggered indexing for custom data documents");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_joins_slug_and_item_id() {
        assert_eq!(custom_data_entity_id("handbook", "42"), "handbook::42");
    }

    #[test]
    fn metadata_merges_custom_fields_alongside_the_fixed_keys() {
        let doc = CustomDataDocumentPayload {
            id: "1".into(),
            name: "Intro".into(),
            description: None,
            content: "hello".into(),
            custom_fields: Some(serde_json::json!({ "team": "support" })),
        };
        let artifact = build_document_artifact(TenantId::now_v7(), "handbook", &doc, chrono::Utc::now());
        assert_eq!(artifact.metadata["name"], "Intro");
        assert_eq!(artifact.metadata["slug"], "handbook");
        assert_eq!(artifact.metadata["team"], "support");
        assert_eq!(artifact.content["content"], "hello");
    }
}
