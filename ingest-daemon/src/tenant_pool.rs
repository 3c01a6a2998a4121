//! Per-tenant connection pool cache, grounded on
//! `tenant_db_manager.acquire_connection(tenant_id)`: each tenant's
//! artifacts and sync state live in its own schema, so a pool is built
//! once per tenant connection string and reused across jobs rather than
//! reconnecting per message.

use dashmap::DashMap;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use ingest_core::{IngestError, IngestResult, TenantId};
use tokio_postgres::NoTls;

#[derive(Default)]
pub struct TenantPoolCache {
    pools: DashMap<TenantId, Pool>,
}

impl TenantPoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_for(&self, tenant_id: TenantId, database_url: &str) -> IngestResult<Pool> {
        if let Some(pool) = self.pools.get(&tenant_id) {
            return Ok(pool.clone());
        }

        let mut cfg = Config::new();
        cfg.url = Some(database_url.to_string());
        cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });
        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| IngestError::Other(e.into()))?;

        self.pools.insert(tenant_id, pool.clone());
        Ok(pool)
    }
}
