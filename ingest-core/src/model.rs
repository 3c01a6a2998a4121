//! Core data model: artifacts, documents, chunks, exclusion rules, usage.

use crate::enums::{EntityKind, PermissionPolicy, UsageMetric, UsageSource};
use crate::identity::{ArtifactId, BackfillId, ChunkId, DocumentId, ExclusionRuleId, TenantId};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A raw artifact pulled from a source, keyed by `(entity_kind, entity_id)`
/// within a tenant. Artifacts are upserted monotonically on
/// `source_updated_at`: see [`crate::model::Artifact::supersedes`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub tenant_id: TenantId,
    pub entity: EntityKind,
    /// Source-native identifier, e.g. an Asana gid or a Pylon issue id.
    pub entity_id: String,
    pub source_updated_at: DateTime<Utc>,
    pub content: serde_json::Value,
    pub metadata: serde_json::Value,
    /// Set when a historical backfill wrote or force-refreshed this row.
    pub last_seen_backfill_id: Option<BackfillId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// Whether `self` is a strictly newer version of the same entity than
    /// `existing`, per the monotonic upsert gate: a write only replaces
    /// stored content when its `source_updated_at` is strictly greater.
    /// Force-upserts bypass this check entirely.
    pub fn supersedes(&self, existing: &Artifact) -> bool {
        self.source_updated_at > existing.source_updated_at
    }
}

/// A transformed, permissioned document produced from one or more artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub tenant_id: TenantId,
    pub entity: EntityKind,
    pub entity_id: String,
    pub source_updated_at: DateTime<Utc>,
    pub permission_policy: PermissionPolicy,
    /// Tokens of the form `email:<lowercased>`, populated only when
    /// `permission_policy` is [`PermissionPolicy::Private`].
    pub permission_allowed_tokens: Vec<String>,
    pub header: String,
    pub body: String,
    pub chunks: Vec<Chunk>,
}

/// One chunk of a document's embedding-ready text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    /// Zero-based ordinal among this document's chunks.
    pub index: u32,
    pub total: u32,
    pub content: String,
    pub content_hash: [u8; 32],
}

/// One row of a tenant's exclusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub id: ExclusionRuleId,
    pub tenant_id: TenantId,
    pub kind: ExclusionRuleKind,
    /// Glob or literal pattern, interpreted per `kind`.
    pub pattern: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRuleKind {
    GithubFile,
    SlackChannel,
    LinearIssue,
}

impl ExclusionRuleKind {
    /// The entity kind this exclusion rule kind applies to, used when a
    /// caller needs to go the other direction (entity kind -> rule kind)
    /// to decide whether exclusion filtering applies at all.
    pub fn for_entity(entity: EntityKind) -> Option<Self> {
        match entity {
            EntityKind::GithubFile => Some(ExclusionRuleKind::GithubFile),
            EntityKind::SlackChannel => Some(ExclusionRuleKind::SlackChannel),
            EntityKind::LinearIssue => Some(ExclusionRuleKind::LinearIssue),
            _ => None,
        }
    }
}

/// A single usage counter increment, matching the `usage_records` table: one
/// row per `(tenant, metric_type, source_type)` recording event, with
/// `source_details` carrying free-form attribution (e.g. a backfill id or
/// query string hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub tenant_id: TenantId,
    pub metric_type: UsageMetric,
    pub metric_value: i64,
    pub source_type: UsageSource,
    pub source_details: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A billing period `[start, end)`, derived by walking from a tenant's
/// billing anchor day to the period containing `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap();
    let first_of_this = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    (first_of_next - first_of_this).num_days() as u32
}

/// Build a date for `(year, month, anchor_day)`, clamping `anchor_day` down
/// to the last day of the month when the month is too short (e.g. an anchor
/// of 31 in February).
fn anchor_date(year: i32, month: u32, anchor_day: u32) -> NaiveDate {
    let day = anchor_day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

impl BillingPeriod {
    /// Compute the billing period containing `now`, given a tenant's
    /// billing anchor day of month (1-31). Walks backward or forward one
    /// month from `now`'s calendar month to find the bracketing anchors.
    pub fn current_for_anchor(anchor_day: u32, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let (year, month) = (today.year(), today.month());
        let this_month_anchor = anchor_date(year, month, anchor_day);

        let start_date = if today >= this_month_anchor {
            this_month_anchor
        } else {
            let (prev_year, prev_month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
            anchor_date(prev_year, prev_month, anchor_day)
        };

        let (start_year, start_month) = (start_date.year(), start_date.month());
        let (next_year, next_month) = if start_month == 12 {
            (start_year + 1, 1)
        } else {
            (start_year, start_month + 1)
        };
        let end_date = anchor_date(next_year, next_month, anchor_day);

        let start = Utc.from_utc_datetime(&start_date.and_hms_opt(0, 0, 0).unwrap());
        let end = Utc.from_utc_datetime(&end_date.and_hms_opt(0, 0, 0).unwrap());
        BillingPeriod { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityIdType;
    use chrono::TimeZone;

    #[test]
    fn billing_period_mid_month_anchor() {
        let now = Utc.with_ymd_and_hms(2026, 7, 20, 12, 0, 0).unwrap();
        let period = BillingPeriod::current_for_anchor(15, now);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2026, 7, 15, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2026, 8, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn billing_period_before_anchor_rolls_back_a_month() {
        let now = Utc.with_ymd_and_hms(2026, 7, 5, 0, 0, 0).unwrap();
        let period = BillingPeriod::current_for_anchor(15, now);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2026, 7, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn billing_period_clamps_short_february() {
        // Anchor day 31 falls back to Feb 28 in a non-leap year.
        let now = Utc.with_ymd_and_hms(2027, 2, 28, 0, 0, 0).unwrap();
        let period = BillingPeriod::current_for_anchor(31, now);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2027, 1, 31, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2027, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn billing_period_clamps_leap_february() {
        let now = Utc.with_ymd_and_hms(2028, 2, 29, 0, 0, 0).unwrap();
        let period = BillingPeriod::current_for_anchor(31, now);
        assert_eq!(period.end, Utc.with_ymd_and_hms(2028, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn artifact_supersedes_is_strict() {
        let tenant = TenantId::now_v7();
        let base_time = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let older = Artifact {
            id: ArtifactId::now_v7(),
            tenant_id: tenant,
            entity: EntityKind::AsanaTask,
            entity_id: "123".into(),
            source_updated_at: base_time,
            content: serde_json::json!({}),
            metadata: serde_json::json!({}),
            last_seen_backfill_id: None,
            created_at: base_time,
            updated_at: base_time,
        };
        let mut same_time = older.clone();
        same_time.id = ArtifactId::now_v7();
        assert!(!same_time.supersedes(&older));

        let mut newer = older.clone();
        newer.source_updated_at = base_time + chrono::Duration::seconds(1);
        assert!(newer.supersedes(&older));
    }
}
