//! Per-tenant database connection resolution, grounded on
//! `tenant_db_manager.acquire_connection(tenant_id)`: usage records live in
//! each tenant's own database/schema rather than a shared multi-tenant
//! table, so callers inject how to reach it.

use async_trait::async_trait;
use deadpool_postgres::Object;
use ingest_core::{IngestError, IngestResult, TenantId};

#[async_trait]
pub trait TenantDbPools: Send + Sync {
    async fn acquire(&self, tenant_id: TenantId) -> IngestResult<Object>;
}

/// A `TenantDbPools` backed by a single shared pool, for deployments that
/// keep all tenants in one database distinguished by a `tenant_id` column
/// rather than per-tenant schemas.
#[derive(Clone)]
pub struct SharedPool(pub deadpool_postgres::Pool);

#[async_trait]
impl TenantDbPools for SharedPool {
    async fn acquire(&self, _tenant_id: TenantId) -> IngestResult<Object> {
        self.0.get().await.map_err(|e| IngestError::Other(e.into()))
    }
}
