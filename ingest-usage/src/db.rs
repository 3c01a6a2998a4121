//! Tenant usage-record storage, grounded on
//! `usage_tracker.py::_write_to_tenant_database` /
//! `_get_usage_from_database` / `rehydrate_redis_from_database`'s queries
//! against the tenant's `usage_records` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{IngestError, IngestResult, TenantId};

use crate::tenant_db::TenantDbPools;

/// Storage boundary for usage records, kept separate from `UsageTracker` so
/// the quota-check and Redis-caching logic can be exercised against an
/// in-memory fake without a live database.
#[async_trait]
pub trait UsageRecordStore: Send + Sync {
    async fn insert(
        &self,
        tenant_id: TenantId,
        metric_type: &str,
        metric_value: i64,
        source_type: &str,
        source_details: Option<&serde_json::Value>,
        recorded_at: DateTime<Utc>,
    ) -> IngestResult<()>;

    async fn sum_in_range(
        &self,
        tenant_id: TenantId,
        metric_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> IngestResult<i64>;

    /// Daily totals for `metric_type` since `since`, used by `rehydrate`.
    async fn sum_by_day_since(
        &self,
        tenant_id: TenantId,
        metric_type: &str,
        since: DateTime<Utc>,
    ) -> IngestResult<Vec<(DateTime<Utc>, i64)>>;
}

pub struct PgUsageRecordStore {
    pools: std::sync::Arc<dyn TenantDbPools>,
}

impl PgUsageRecordStore {
    pub fn new(pools: std::sync::Arc<dyn TenantDbPools>) -> Self {
        Self { pools }
    }
}

#[async_trait]
impl UsageRecordStore for PgUsageRecordStore {
    async fn insert(
        &self,
        tenant_id: TenantId,
        metric_type: &str,
        metric_value: i64,
        source_type: &str,
        source_details: Option<&serde_json::Value>,
        recorded_at: DateTime<Utc>,
    ) -> IngestResult<()> {
        let conn = self.pools.acquire(tenant_id).await?;
        conn.execute(
            "INSERT INTO usage_records \
             (metric_type, metric_value, source_type, source_details, recorded_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[&metric_type, &metric_value, &source_type, &source_details, &recorded_at, &recorded_at],
        )
        .await
        .map_err(|e| IngestError::Other(e.into()))?;
        Ok(())
    }

    async fn sum_in_range(
        &self,
        tenant_id: TenantId,
        metric_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> IngestResult<i64> {
        let conn = self.pools.acquire(tenant_id).await?;
        let row = conn
            .query_one(
                "SELECT COALESCE(SUM(metric_value), 0) FROM usage_records \
                 WHERE metric_type = $1 AND recorded_at >= $2 AND recorded_at < $3",
                &[&metric_type, &start, &end],
            )
            .await
            .map_err(|e| IngestError::Other(e.into()))?;
        Ok(row.get(0))
    }

    async fn sum_by_day_since(
        &self,
        tenant_id: TenantId,
        metric_type: &str,
        since: DateTime<Utc>,
    ) -> IngestResult<Vec<(DateTime<Utc>, i64)>> {
        let conn = self.pools.acquire(tenant_id).await?;
        let rows = conn
            .query(
                "SELECT date_trunc('day', recorded_at), SUM(metric_value) FROM usage_records \
                 WHERE metric_type = $1 AND recorded_at >= $2 \
                 GROUP BY date_trunc('day', recorded_at) ORDER BY 1",
                &[&metric_type, &since],
            )
            .await
            .map_err(|e| IngestError::Other(e.into()))?;
        Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Row {
        metric_type: String,
        metric_value: i64,
        recorded_at: DateTime<Utc>,
    }

    #[derive(Default)]
    pub struct MemoryUsageRecordStore {
        rows: Mutex<HashMap<TenantId, Vec<Row>>>,
    }

    #[async_trait]
    impl UsageRecordStore for MemoryUsageRecordStore {
        async fn insert(
            &self,
            tenant_id: TenantId,
            metric_type: &str,
            metric_value: i64,
            _source_type: &str,
            _source_details: Option<&serde_json::Value>,
            recorded_at: DateTime<Utc>,
        ) -> IngestResult<()> {
            self.rows.lock().await.entry(tenant_id).or_default().push(Row {
                metric_type: metric_type.to_string(),
                metric_value,
                recorded_at,
            });
            Ok(())
        }

        async fn sum_in_range(
            &self,
            tenant_id: TenantId,
            metric_type: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> IngestResult<i64> {
            let rows = self.rows.lock().await;
            let total = rows
                .get(&tenant_id)
                .map(|rows| {
                    rows.iter()
                        .filter(|r| r.metric_type == metric_type && r.recorded_at >= start && r.recorded_at < end)
                        .map(|r| r.metric_value)
                        .sum()
                })
                .unwrap_or(0);
            Ok(total)
        }

        async fn sum_by_day_since(
            &self,
            tenant_id: TenantId,
            metric_type: &str,
            since: DateTime<Utc>,
        ) -> IngestResult<Vec<(DateTime<Utc>, i64)>> {
            let rows = self.rows.lock().await;
            let mut by_day: HashMap<DateTime<Utc>, i64> = HashMap::new();
            if let Some(rows) = rows.get(&tenant_id) {
                for row in rows {
                    if row.metric_type == metric_type && row.recorded_at >= since {
                        let day = row.recorded_at.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
                        *by_day.entry(day).or_insert(0) += row.metric_value;
                    }
                }
            }
            let mut out: Vec<_> = by_day.into_iter().collect();
            out.sort_by_key(|(day, _)| *day);
            Ok(out)
        }
    }
}
