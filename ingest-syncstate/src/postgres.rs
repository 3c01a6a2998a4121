//! Postgres-backed sync state store over the `config(key, value)` table,
//! grounded on `AsanaSyncService._get_str`/`_set_str`.

use crate::SyncStateStore;
use async_trait::async_trait;
use deadpool_postgres::Pool;
use ingest_core::{IngestError, IngestResult};

#[derive(Clone)]
pub struct PgSyncStateStore {
    pool: Pool,
}

impl PgSyncStateStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStateStore for PgSyncStateStore {
    async fn get_str(&self, key: &str) -> IngestResult<Option<String>> {
        let conn = self.pool.get().await.map_err(|e| IngestError::Other(e.into()))?;
        let row = conn
            .query_opt("SELECT value FROM config WHERE key = $1", &[&key])
            .await
            .map_err(|e| IngestError::Other(e.into()))?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn set_str(&self, key: &str, value: Option<&str>) -> IngestResult<()> {
        let conn = self.pool.get().await.map_err(|e| IngestError::Other(e.into()))?;
        match value {
            None => {
                conn.execute("DELETE FROM config WHERE key = $1", &[&key])
                    .await
                    .map_err(|e| IngestError::Other(e.into()))?;
            }
            Some(value) => {
                conn.execute(
                    "INSERT INTO config (key, value) VALUES ($1, $2) \
                     ON CONFLICT (key) DO UPDATE SET value = $2",
                    &[&key, &value],
                )
                .await
                .map_err(|e| IngestError::Other(e.into()))?;
            }
        }
        Ok(())
    }
}
