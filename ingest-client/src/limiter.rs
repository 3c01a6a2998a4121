//! Per-tenant, per-source rate limiter cache.
//!
//! One limiter pair lives per `(tenant_id, source)` for the lifetime of the
//! process, shared by every extractor run against that tenant so historical
//! and incremental backfills draw from the same budget instead of each
//! opening its own allowance.

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use ingest_core::TenantId;
use once_cell::sync::Lazy;
use std::num::NonZeroU32;
use std::sync::Arc;

pub type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// The two request buckets most source APIs distinguish: a generous general
/// endpoint budget and a tighter search/query endpoint budget.
pub struct SourceLimiters {
    pub general: DirectLimiter,
    pub search: DirectLimiter,
}

impl SourceLimiters {
    fn new(general_per_min: u32, search_per_min: u32) -> Self {
        Self {
            general: RateLimiter::direct(Quota::per_minute(
                NonZeroU32::new(general_per_min).expect("general_per_min must be nonzero"),
            )),
            search: RateLimiter::direct(Quota::per_minute(
                NonZeroU32::new(search_per_min).expect("search_per_min must be nonzero"),
            )),
        }
    }

    pub async fn wait_general(&self) {
        self.general.until_ready().await;
    }

    pub async fn wait_search(&self) {
        self.search.until_ready().await;
    }
}

static LIMITERS: Lazy<DashMap<(TenantId, &'static str), Arc<SourceLimiters>>> =
    Lazy::new(DashMap::new);

/// Fetch or create the limiter pair for `(tenant_id, source)`. Quotas are
/// supplied by the caller because they are source-specific (e.g. Asana's
/// standard limit is 1500 req/min, undershot to 600; its search limit is 60
/// req/min, undershot to 20), but the cache and sharing behavior is generic.
pub fn limiters_for(
    tenant_id: TenantId,
    source: &'static str,
    general_per_min: u32,
    search_per_min: u32,
) -> Arc<SourceLimiters> {
    LIMITERS
        .entry((tenant_id, source))
        .or_insert_with(|| Arc::new(SourceLimiters::new(general_per_min, search_per_min)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::EntityIdType;

    #[test]
    fn limiters_are_shared_across_calls_for_the_same_tenant_and_source() {
        let tenant = TenantId::now_v7();
        let a = limiters_for(tenant, "asana", 600, 20);
        let b = limiters_for(tenant, "asana", 600, 20);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn limiters_are_distinct_per_source() {
        let tenant = TenantId::now_v7();
        let a = limiters_for(tenant, "asana", 600, 20);
        let b = limiters_for(tenant, "pylon", 600, 20);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
