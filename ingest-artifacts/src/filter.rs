use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Metadata-field filter for [`crate::ArtifactRepository::get_by_metadata`],
/// grounded on `artifact_repository.py::_build_metadata_filter`'s three
/// independent filter shapes, which combine with `AND`.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    /// JSONB containment (`metadata @> equality`): every key/value pair here
    /// must be present in the stored metadata.
    pub equality: Option<serde_json::Value>,
    /// `metadata ->> key = ANY(values)` per entry.
    pub batches: HashMap<String, Vec<String>>,
    /// `(metadata ->> key)::timestamptz BETWEEN start AND end` per entry.
    pub ranges: HashMap<String, (DateTime<Utc>, DateTime<Utc>)>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.equality.is_none() && self.batches.is_empty() && self.ranges.is_empty()
    }

    pub fn with_equality(mut self, value: serde_json::Value) -> Self {
        self.equality = Some(value);
        self
    }

    pub fn with_batch(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.batches.insert(key.into(), values);
        self
    }

    pub fn with_range(mut self, key: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.ranges.insert(key.into(), (start, end));
        self
    }
}
