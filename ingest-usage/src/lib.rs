//! Tenant usage metering: quota checks against billing limits, and
//! Redis-primary/database-fallback counters for recording metered events.

mod db;
mod limits;
mod redis_store;
mod tenant_db;
mod tracker;

pub use db::{PgUsageRecordStore, UsageRecordStore};
pub use limits::{BillingLimitsProvider, TenantLimits};
pub use redis_store::RedisCounterStore;
pub use tenant_db::{SharedPool, TenantDbPools};
pub use tracker::{UsageCheckResult, UsageTracker};

#[cfg(test)]
pub use db::memory::MemoryUsageRecordStore;
#[cfg(test)]
pub use redis_store::memory::MemoryRedisCounterStore;
