//! Tenant billing-limits lookup. The original system resolves this through
//! a `billing_limits_service` that reads subscription/trial state from a
//! control-plane database; that service's source was not in the retrieval
//! pack, so it is represented here as an injectable trait.

use async_trait::async_trait;
use ingest_core::{BillingTier, IngestResult, TenantId};

/// Everything `UsageTracker` needs to know about a tenant's billing state.
#[derive(Debug, Clone)]
pub struct TenantLimits {
    /// Gather-managed tenants have no usage limits and are never metered.
    pub is_gather_managed: bool,
    pub is_trial: bool,
    pub tier: BillingTier,
    pub monthly_requests: i64,
    /// Day of month (1-31) the tenant's billing period starts on, whether
    /// that's a subscription's billing cycle anchor or a trial's start day.
    pub billing_anchor_day: u32,
}

#[async_trait]
pub trait BillingLimitsProvider: Send + Sync {
    async fn get_tenant_limits(&self, tenant_id: TenantId) -> IngestResult<TenantLimits>;
}
