//! Usage metering: quota checks against a tenant's billing limits and
//! fire-and-forget recording of metered events, grounded verbatim on
//! `original_source/src/utils/usage_tracker.py`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ingest_core::{BillingPeriod, BillingTier, IngestResult, TenantId, UsageMetric, UsageSource};

use crate::db::UsageRecordStore;
use crate::limits::BillingLimitsProvider;
use crate::redis_store::RedisCounterStore;

/// Redis keys expire after three months, matching `REDIS_KEY_EXPIRATION_SECONDS`.
const REDIS_KEY_EXPIRATION_SECONDS: i64 = 3 * 30 * 24 * 60 * 60;

const ALL_METRICS: [UsageMetric; 4] = [
    UsageMetric::Requests,
    UsageMetric::InputTokens,
    UsageMetric::OutputTokens,
    UsageMetric::EmbeddingTokens,
];

/// Outcome of [`UsageTracker::check_and_record_usage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCheckResult {
    pub allowed: bool,
    pub is_trial: bool,
    pub quota_exceeded: bool,
    pub tier: BillingTier,
}

impl UsageCheckResult {
    /// The fail-open result returned whenever a limits lookup or storage
    /// call errors: the request is allowed through rather than blocked.
    fn fail_open() -> Self {
        UsageCheckResult { allowed: true, is_trial: false, quota_exceeded: false, tier: BillingTier::Trial }
    }
}

#[derive(Clone)]
pub struct UsageTracker {
    redis: Arc<dyn RedisCounterStore>,
    store: Arc<dyn UsageRecordStore>,
    limits: Arc<dyn BillingLimitsProvider>,
}

impl UsageTracker {
    pub fn new(
        redis: Arc<dyn RedisCounterStore>,
        store: Arc<dyn UsageRecordStore>,
        limits: Arc<dyn BillingLimitsProvider>,
    ) -> Self {
        Self { redis, store, limits }
    }

    /// Check `usage_metrics` against the tenant's quota and, if allowed,
    /// record them. Gather-managed tenants and non-billable requests are
    /// let through without a quota check. Only the `requests` metric is
    /// checked against a limit today; every metric present is recorded.
    /// Any internal failure fails open (the request is allowed).
    pub async fn check_and_record_usage(
        &self,
        tenant_id: TenantId,
        usage_metrics: &HashMap<UsageMetric, i64>,
        source_type: UsageSource,
        non_billable: bool,
    ) -> UsageCheckResult {
        match self.check_and_record_usage_inner(tenant_id, usage_metrics, source_type, non_billable).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(%tenant_id, error = %err, "usage check failed, failing open");
                UsageCheckResult::fail_open()
            }
        }
    }

    async fn check_and_record_usage_inner(
        &self,
        tenant_id: TenantId,
        usage_metrics: &HashMap<UsageMetric, i64>,
        source_type: UsageSource,
        non_billable: bool,
    ) -> IngestResult<UsageCheckResult> {
        let limits = self.limits.get_tenant_limits(tenant_id).await?;

        if limits.is_gather_managed {
            tracing::info!(%tenant_id, "gather-managed tenant, skipping usage check and recording");
            return Ok(UsageCheckResult {
                allowed: true,
                is_trial: limits.is_trial,
                quota_exceeded: false,
                tier: limits.tier,
            });
        }

        if non_billable {
            tracing::info!(%tenant_id, "non-billable request, skipping usage recording");
            return Ok(UsageCheckResult {
                allowed: true,
                is_trial: limits.is_trial,
                quota_exceeded: false,
                tier: limits.tier,
            });
        }

        for (&metric_type, &metric_value) in usage_metrics {
            if metric_type == UsageMetric::Requests {
                let current = self.get_monthly_usage(tenant_id, metric_type, limits.billing_anchor_day).await?;
                if current + metric_value > limits.monthly_requests {
                    let quota_exceeded = limits.tier != BillingTier::ExpiredTrial;
                    tracing::warn!(
                        %tenant_id,
                        current,
                        incoming = metric_value,
                        limit = limits.monthly_requests,
                        tier = ?limits.tier,
                        quota_exceeded,
                        "usage limit exceeded"
                    );
                    return Ok(UsageCheckResult {
                        allowed: false,
                        is_trial: limits.is_trial,
                        quota_exceeded,
                        tier: limits.tier,
                    });
                }
            }

            self.record_usage(tenant_id, metric_type, metric_value, source_type, None, limits.billing_anchor_day);
        }

        Ok(UsageCheckResult { allowed: true, is_trial: limits.is_trial, quota_exceeded: false, tier: limits.tier })
    }

    /// Schedule usage recording as a background task; callers are never
    /// blocked on Redis or database writes.
    pub fn record_usage(
        &self,
        tenant_id: TenantId,
        metric_type: UsageMetric,
        metric_value: i64,
        source_type: UsageSource,
        source_details: Option<serde_json::Value>,
        billing_anchor_day: u32,
    ) {
        let tracker = self.clone();
        tokio::spawn(async move {
            tracker
                .record_usage_background(tenant_id, metric_type, metric_value, source_type, source_details, billing_anchor_day)
                .await;
        });
    }

    async fn record_usage_background(
        &self,
        tenant_id: TenantId,
        metric_type: UsageMetric,
        metric_value: i64,
        source_type: UsageSource,
        source_details: Option<serde_json::Value>,
        billing_anchor_day: u32,
    ) {
        let recorded_at = Utc::now();
        let period = BillingPeriod::current_for_anchor(billing_anchor_day, recorded_at);
        let redis_key = Self::redis_key(tenant_id, metric_type, &period);

        let redis_ok = match self.incr_redis(&redis_key, metric_value).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(%tenant_id, error = %err, "failed to record usage to redis");
                false
            }
        };

        let db_ok = match self
            .store
            .insert(tenant_id, &metric_type.to_string(), metric_value, &source_type.to_string(), source_details.as_ref(), recorded_at)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(%tenant_id, error = %err, "failed to record usage to tenant database");
                false
            }
        };

        match (redis_ok, db_ok) {
            (true, true) => tracing::info!(%tenant_id, metric = %metric_type, "usage recorded to redis and database"),
            (true, false) => tracing::warn!(%tenant_id, metric = %metric_type, "usage recorded to redis only"),
            (false, true) => tracing::warn!(%tenant_id, metric = %metric_type, "usage recorded to database only"),
            (false, false) => tracing::error!(%tenant_id, metric = %metric_type, "usage recording failed entirely"),
        }
    }

    /// Current billing-period usage for `metric_type`, read from Redis with
    /// a database fallback (and Redis repopulation) when the key is
    /// missing, or Redis itself is unreachable.
    pub async fn get_monthly_usage(
        &self,
        tenant_id: TenantId,
        metric_type: UsageMetric,
        billing_anchor_day: u32,
    ) -> IngestResult<i64> {
        let period = BillingPeriod::current_for_anchor(billing_anchor_day, Utc::now());
        let redis_key = Self::redis_key(tenant_id, metric_type, &period);

        let cached = self.redis.get(&redis_key).await;

        match cached {
            Ok(Some(total)) => Ok(total),
            Ok(None) => {
                let db_usage = self.store.sum_in_range(tenant_id, &metric_type.to_string(), period.start, period.end).await?;
                if let Err(err) = self.populate_redis_key(&redis_key, db_usage).await {
                    tracing::warn!(%tenant_id, error = %err, "failed to repopulate redis after database fallback");
                }
                Ok(db_usage)
            }
            Err(err) => {
                tracing::warn!(%tenant_id, error = %err, "redis unavailable, falling back to database");
                self.store.sum_in_range(tenant_id, &metric_type.to_string(), period.start, period.end).await
            }
        }
    }

    /// Rebuild Redis usage counters from the tenant database, grouping by
    /// calendar day over the trailing `days_back` window. Returns the
    /// Redis keys that were restored.
    pub async fn rehydrate(
        &self,
        tenant_id: TenantId,
        metric_type: Option<UsageMetric>,
        days_back: i64,
    ) -> IngestResult<HashMap<String, i64>> {
        let metrics: Vec<UsageMetric> = match metric_type {
            Some(m) => vec![m],
            None => ALL_METRICS.to_vec(),
        };
        let cutoff = Utc::now() - chrono::Duration::days(days_back);
        let mut restored = HashMap::new();

        for metric in metrics {
            let days = self.store.sum_by_day_since(tenant_id, &metric.to_string(), cutoff).await?;
            for (day, total) in days {
                let key = format!("usage:{}:{}:{}", tenant_id, metric, day.format("%Y-%m-%d"));
                match self.populate_redis_key(&key, total).await {
                    Ok(()) => {
                        restored.insert(key, total);
                    }
                    Err(err) => tracing::error!(%tenant_id, key, error = %err, "failed to restore redis key"),
                }
            }
        }

        tracing::info!(%tenant_id, restored = restored.len(), days_back, "rehydrated usage keys from database");
        Ok(restored)
    }

    async fn incr_redis(&self, key: &str, value: i64) -> IngestResult<()> {
        self.redis.incrby_with_ttl_if_unset(key, value, REDIS_KEY_EXPIRATION_SECONDS).await
    }

    async fn populate_redis_key(&self, key: &str, value: i64) -> IngestResult<()> {
        self.redis.set_with_ttl(key, value, REDIS_KEY_EXPIRATION_SECONDS).await
    }

    fn redis_key(tenant_id: TenantId, metric_type: UsageMetric, period: &BillingPeriod) -> String {
        format!("usage:{}:{}:{}", tenant_id, metric_type, period.start.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryUsageRecordStore;
    use crate::limits::TenantLimits;
    use crate::redis_store::memory::MemoryRedisCounterStore;
    use async_trait::async_trait;
    use ingest_core::EntityIdType;

    struct FixedLimits(TenantLimits);

    #[async_trait]
    impl BillingLimitsProvider for FixedLimits {
        async fn get_tenant_limits(&self, _tenant_id: TenantId) -> IngestResult<TenantLimits> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn redis_key_is_namespaced_by_tenant_metric_and_period() {
        let tenant = TenantId::now_v7();
        let period = BillingPeriod::current_for_anchor(1, Utc::now());
        let key = UsageTracker::redis_key(tenant, UsageMetric::Requests, &period);
        assert!(key.starts_with(&format!("usage:{}:requests:", tenant)));
    }

    #[tokio::test]
    async fn memory_store_sums_only_matching_metric_and_range() {
        let store = MemoryUsageRecordStore::default();
        let tenant = TenantId::now_v7();
        let now = Utc::now();

        store.insert(tenant, "requests", 3, "search", None, now).await.unwrap();
        store.insert(tenant, "requests", 4, "search", None, now).await.unwrap();
        store.insert(tenant, "input_tokens", 100, "search", None, now).await.unwrap();

        let total = store
            .sum_in_range(tenant, "requests", now - chrono::Duration::days(1), now + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(total, 7);
    }

    #[test]
    fn fixed_limits_provider_is_usable_as_trait_object() {
        let provider: Arc<dyn BillingLimitsProvider> = Arc::new(FixedLimits(TenantLimits {
            is_gather_managed: false,
            is_trial: true,
            tier: BillingTier::Trial,
            monthly_requests: 1000,
            billing_anchor_day: 1,
        }));
        assert!(Arc::strong_count(&provider) >= 1);
    }

    fn tracker_with_limit(monthly_requests: i64, tier: BillingTier) -> (UsageTracker, Arc<MemoryUsageRecordStore>) {
        let store = Arc::new(MemoryUsageRecordStore::default());
        let tracker = UsageTracker::new(
            Arc::new(MemoryRedisCounterStore::new()),
            store.clone(),
            Arc::new(FixedLimits(TenantLimits {
                is_gather_managed: false,
                is_trial: tier == BillingTier::Trial,
                tier,
                monthly_requests,
                billing_anchor_day: 1,
            })),
        );
        (tracker, store)
    }

    // Testable property 7: limit=100, current=99 — one more request is
    // allowed; once that request has landed, repeating it denies.
    #[tokio::test]
    async fn quota_boundary_allows_up_to_limit_then_denies() {
        let (tracker, store) = tracker_with_limit(100, BillingTier::Paid);
        let tenant = TenantId::now_v7();
        store.insert(tenant, "requests", 99, "test", None, Utc::now()).await.unwrap();

        let metrics = HashMap::from([(UsageMetric::Requests, 1)]);
        let first = tracker.check_and_record_usage(tenant, &metrics, UsageSource::AgentQuery, false).await;
        assert!(first.allowed);
        assert!(!first.quota_exceeded);

        // Simulate the first request's fire-and-forget write having landed.
        store.insert(tenant, "requests", 1, "test", None, Utc::now()).await.unwrap();

        let second = tracker.check_and_record_usage(tenant, &metrics, UsageSource::AgentQuery, false).await;
        assert!(!second.allowed);
        assert!(second.quota_exceeded);
    }

    #[tokio::test]
    async fn expired_trial_denies_without_quota_exceeded_flag() {
        let (tracker, store) = tracker_with_limit(100, BillingTier::ExpiredTrial);
        let tenant = TenantId::now_v7();
        store.insert(tenant, "requests", 100, "test", None, Utc::now()).await.unwrap();

        let metrics = HashMap::from([(UsageMetric::Requests, 1)]);
        let result = tracker.check_and_record_usage(tenant, &metrics, UsageSource::AgentQuery, false).await;
        assert!(!result.allowed);
        assert!(!result.quota_exceeded, "expired trial denies on time, not quota");
    }

    #[tokio::test]
    async fn gather_managed_tenant_is_never_metered() {
        let store = Arc::new(MemoryUsageRecordStore::default());
        let tracker = UsageTracker::new(
            Arc::new(MemoryRedisCounterStore::new()),
            store,
            Arc::new(FixedLimits(TenantLimits {
                is_gather_managed: true,
                is_trial: false,
                tier: BillingTier::Paid,
                monthly_requests: 1,
                billing_anchor_day: 1,
            })),
        );
        let tenant = TenantId::now_v7();
        let metrics = HashMap::from([(UsageMetric::Requests, 1000)]);
        let result = tracker.check_and_record_usage(tenant, &metrics, UsageSource::AgentQuery, false).await;
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn redis_miss_falls_back_to_database_and_repopulates() {
        let (tracker, store) = tracker_with_limit(1000, BillingTier::Paid);
        let tenant = TenantId::now_v7();
        store.insert(tenant, "requests", 42, "test", None, Utc::now()).await.unwrap();

        let current = tracker.get_monthly_usage(tenant, UsageMetric::Requests, 1).await.unwrap();
        assert_eq!(current, 42);
    }
}
