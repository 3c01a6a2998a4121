//! Work-queue message schema, grounded on `connectors/base/models.py`'s
//! `BackfillIngestConfig` and its per-connector subclasses
//! (`AsanaFullBackfillConfig`, `AsanaIncrBackfillConfig`,
//! `AsanaPermissionsBackfillConfig`, `PylonFullBackfillConfig`,
//! `PylonIncrementalBackfillConfig`, `CustomDataIngestConfig`): a Pydantic
//! discriminated union keyed by a `source` literal, reimplemented here as a
//! Rust tagged enum with the same discriminant.

use chrono::{DateTime, Utc};
use ingest_core::{BackfillId, TenantId};
#[cfg(test)]
use ingest_core::EntityIdType;
use serde::{Deserialize, Serialize};

/// Fields every backfill message carries regardless of source, matching
/// `BackfillIngestConfig`'s base fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillEnvelope {
    pub tenant_id: TenantId,
    /// Present once a root job has minted one; carried through continuation
    /// messages so the whole multi-job run shares one id.
    #[serde(default)]
    pub backfill_id: Option<BackfillId>,
    #[serde(default)]
    pub suppress_notification: bool,
    #[serde(default)]
    pub force_update: bool,
}

impl BackfillEnvelope {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id, backfill_id: None, suppress_notification: false, force_update: false }
    }

    pub fn suppressed(mut self) -> Self {
        self.suppress_notification = true;
        self
    }

    pub fn with_backfill_id(mut self, backfill_id: BackfillId) -> Self {
        self.backfill_id = Some(backfill_id);
        self
    }
}

/// A single custom-data document payload, matching
/// `CustomDataDocumentPayload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomDataDocumentPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content: String,
    #[serde(default)]
    pub custom_fields: Option<serde_json::Value>,
}

/// A work-queue message, discriminated by `source` exactly as the Python
/// originals discriminate their Pydantic union.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum IngestMessage {
    AsanaFullBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
        #[serde(default = "default_full_backfill_duration_seconds")]
        duration_seconds: u64,
    },
    AsanaIncrBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
    },
    AsanaPermissionsBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
    },
    PylonFullBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
        #[serde(default = "default_full_backfill_duration_seconds")]
        duration_seconds: u64,
    },
    PylonIncrBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
        #[serde(default = "default_pylon_lookback_hours")]
        lookback_hours: u32,
    },
    TrackerFullBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
        #[serde(default = "default_full_backfill_duration_seconds")]
        duration_seconds: u64,
    },
    TrackerIncrBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
        #[serde(default = "default_pylon_lookback_hours")]
        lookback_hours: u32,
    },
    TrackerPermissionsBackfill {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
    },
    CustomDataIngest {
        #[serde(flatten)]
        envelope: BackfillEnvelope,
        slug: String,
        documents: Vec<CustomDataDocumentPayload>,
    },
}

/// SQS visibility timeout is 15 minutes; backfill jobs undershoot it so a
/// job always finishes (or re-enqueues) before the message becomes visible
/// again to another worker.
fn default_full_backfill_duration_seconds() -> u64 {
    60 * 13
}

fn default_pylon_lookback_hours() -> u32 {
    2
}

impl IngestMessage {
    pub fn source(&self) -> &'static str {
        match self {
            IngestMessage::AsanaFullBackfill { .. } => "asana_full_backfill",
            IngestMessage::AsanaIncrBackfill { .. } => "asana_incr_backfill",
            IngestMessage::AsanaPermissionsBackfill { .. } => "asana_permissions_backfill",
            IngestMessage::PylonFullBackfill { .. } => "pylon_full_backfill",
            IngestMessage::PylonIncrBackfill { .. } => "pylon_incremental_backfill",
            IngestMessage::TrackerFullBackfill { .. } => "tracker_full_backfill",
            IngestMessage::TrackerIncrBackfill { .. } => "tracker_incremental_backfill",
            IngestMessage::TrackerPermissionsBackfill { .. } => "tracker_permissions_backfill",
            IngestMessage::CustomDataIngest { .. } => "custom_data_ingest",
        }
    }

    pub fn envelope(&self) -> &BackfillEnvelope {
        match self {
            IngestMessage::AsanaFullBackfill { envelope, .. }
            | IngestMessage::AsanaIncrBackfill { envelope }
            | IngestMessage::AsanaPermissionsBackfill { envelope }
            | IngestMessage::PylonFullBackfill { envelope, .. }
            | IngestMessage::PylonIncrBackfill { envelope, .. }
            | IngestMessage::TrackerFullBackfill { envelope, .. }
            | IngestMessage::TrackerIncrBackfill { envelope, .. }
            | IngestMessage::TrackerPermissionsBackfill { envelope }
            | IngestMessage::CustomDataIngest { envelope, .. } => envelope,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.envelope().tenant_id
    }
}

/// A queue item pairs a decoded message with the scheduling metadata a
/// `WorkQueue` needs (an opaque handle for ack/extend, and the enqueue
/// time for observability), matching what an SQS message looks like once
/// deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub message: IngestMessage,
    pub enqueued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_preserving_the_source_tag() {
        let msg = IngestMessage::AsanaIncrBackfill {
            envelope: BackfillEnvelope::new(TenantId::now_v7()).suppressed(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["source"], "asana_incr_backfill");
        let back: IngestMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.source(), "asana_incr_backfill");
    }

    #[test]
    fn full_backfill_duration_defaults_when_omitted() {
        let json = serde_json::json!({
            "source": "pylon_full_backfill",
            "tenant_id": TenantId::now_v7(),
        });
        let msg: IngestMessage = serde_json::from_value(json).unwrap();
        assert!(matches!(
            msg,
            IngestMessage::PylonFullBackfill { duration_seconds: 780, .. }
        ));
    }

    #[test]
    fn custom_data_ingest_carries_its_document_batch() {
        let json = serde_json::json!({
            "source": "custom_data_ingest",
            "tenant_id": TenantId::now_v7(),
            "slug": "handbook",
            "documents": [{"id": "1", "name": "Intro", "content": "hello"}],
        });
        let msg: IngestMessage = serde_json::from_value(json).unwrap();
        match msg {
            IngestMessage::CustomDataIngest { slug, documents, .. } => {
                assert_eq!(slug, "handbook");
                assert_eq!(documents.len(), 1);
            }
            _ => panic!("expected custom data ingest"),
        }
    }
}
