//! `deadpool-postgres`/`tokio-postgres`-backed [`crate::ArtifactRepository`],
//! grounded directly on
//! `original_source/src/ingest/repositories/artifact_repository.py`'s SQL
//! shapes.

use crate::{apply_exclusions, ArtifactRepository, MetadataFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{GenericClient, Pool};
use ingest_core::{Artifact, BackfillId, EntityKind, IngestError, IngestResult, TenantId};
use ingest_exclusion::ExclusionEngine;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

/// Artifacts are upserted in batches of this size per statement, matching
/// the batching note carried over from `SPEC_FULL.md`'s storage section.
const UPSERT_BATCH_SIZE: usize = 1000;

/// A `deadpool-postgres` pool scoped to a single tenant's schema (per
/// `SPEC_FULL.md`'s per-tenant-schema isolation note) — `ingest_artifact`
/// rows carry no `tenant_id` column of their own, so it's threaded through
/// here for the in-process `Artifact` model instead.
pub struct PgArtifactRepository {
    pool: Pool,
    tenant_id: TenantId,
}

impl PgArtifactRepository {
    pub fn new(pool: Pool, tenant_id: TenantId) -> Self {
        Self { pool, tenant_id }
    }

    async fn conn(&self) -> IngestResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| IngestError::Other(e.into()))
    }

    async fn upsert_chunk(&self, artifacts: &[Artifact], force: bool, backfill_id: Option<BackfillId>) -> IngestResult<()> {
        if artifacts.is_empty() {
            return Ok(());
        }
        let conn = self.conn().await?;
        let stmt = if force {
            "INSERT INTO ingest_artifact (id, entity, entity_id, metadata, content, source_updated_at, last_seen_backfill_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (entity, entity_id) DO UPDATE SET
                 id = EXCLUDED.id,
                 metadata = EXCLUDED.metadata,
                 content = EXCLUDED.content,
                 source_updated_at = EXCLUDED.source_updated_at,
                 last_seen_backfill_id = EXCLUDED.last_seen_backfill_id"
        } else {
            "INSERT INTO ingest_artifact (id, entity, entity_id, metadata, content, source_updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (entity, entity_id) DO UPDATE SET
                 id = EXCLUDED.id,
                 metadata = EXCLUDED.metadata,
                 content = EXCLUDED.content,
                 source_updated_at = EXCLUDED.source_updated_at
             WHERE ingest_artifact.source_updated_at < EXCLUDED.source_updated_at"
        };
        let prepared = conn.prepare_cached(stmt).await.map_err(|e| IngestError::Other(e.into()))?;

        for artifact in artifacts {
            let entity = artifact.entity.to_string();
            let backfill_str = backfill_id.map(|id| id.to_string());
            if force {
                conn.execute(
                    &prepared,
                    &[
                        &artifact.id.as_uuid(),
                        &entity,
                        &artifact.entity_id,
                        &artifact.metadata,
                        &artifact.content,
                        &artifact.source_updated_at,
                        &backfill_str,
                    ],
                )
                .await
            } else {
                conn.execute(
                    &prepared,
                    &[
                        &artifact.id.as_uuid(),
                        &entity,
                        &artifact.entity_id,
                        &artifact.metadata,
                        &artifact.content,
                        &artifact.source_updated_at,
                    ],
                )
                .await
            }
            .map_err(|e| IngestError::Other(e.into()))?;
        }
        Ok(())
    }

    async fn query_rows(&self, entity: EntityKind, where_clause: &str, params: &[&(dyn ToSql + Sync)]) -> IngestResult<Vec<Artifact>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT id, entity, entity_id, content, metadata, source_updated_at, last_seen_backfill_id, created_at, updated_at \
             FROM ingest_artifact {where_clause}"
        );
        let rows = conn.query(&sql, params).await.map_err(|e| IngestError::Other(e.into()))?;

        rows.into_iter()
            .map(|row| row_to_artifact(entity, self.tenant_id, row))
            .collect()
    }
}

fn row_to_artifact(entity: EntityKind, tenant_id: TenantId, row: tokio_postgres::Row) -> IngestResult<Artifact> {
    let id: Uuid = row.get("id");
    let entity_id: String = row.get("entity_id");
    let content: serde_json::Value = row.get("content");
    let metadata: serde_json::Value = row.get("metadata");
    let source_updated_at: DateTime<Utc> = row.get("source_updated_at");
    let last_seen_backfill_id: Option<String> = row.get("last_seen_backfill_id");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    let last_seen_backfill_id = last_seen_backfill_id
        .map(|raw| raw.parse().map_err(|e: ingest_core::EntityIdParseError| IngestError::Other(e.into())))
        .transpose()?;

    Ok(Artifact {
        id: ingest_core::ArtifactId::new(id),
        tenant_id,
        entity,
        entity_id,
        source_updated_at,
        content,
        metadata,
        last_seen_backfill_id,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl ArtifactRepository for PgArtifactRepository {
    async fn upsert(&self, artifact: &Artifact) -> IngestResult<()> {
        self.upsert_chunk(std::slice::from_ref(artifact), false, None).await
    }

    async fn force_upsert(&self, artifact: &Artifact) -> IngestResult<()> {
        self.upsert_chunk(std::slice::from_ref(artifact), true, artifact.last_seen_backfill_id).await
    }

    async fn upsert_batch(&self, artifacts: &[Artifact]) -> IngestResult<()> {
        for chunk in artifacts.chunks(UPSERT_BATCH_SIZE) {
            self.upsert_chunk(chunk, false, None).await?;
        }
        Ok(())
    }

    async fn force_upsert_batch(&self, artifacts: &[Artifact]) -> IngestResult<()> {
        for chunk in artifacts.chunks(UPSERT_BATCH_SIZE) {
            // All artifacts in one force-upsert call share a backfill run, so
            // it's safe to key off the first artifact's backfill id.
            let backfill_id = chunk.first().and_then(|a| a.last_seen_backfill_id);
            self.upsert_chunk(chunk, true, backfill_id).await?;
        }
        Ok(())
    }

    async fn get_by_entity_ids(
        &self,
        entity: EntityKind,
        entity_ids: &[String],
        exclusion: Option<&ExclusionEngine>,
    ) -> IngestResult<Vec<Artifact>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let entity_str = entity.to_string();
        let ids: Vec<String> = entity_ids.to_vec();
        let artifacts = self
            .query_rows(entity, "WHERE entity = $1 AND entity_id = ANY($2)", &[&entity_str, &ids])
            .await?;
        Ok(apply_exclusions(entity, artifacts, exclusion))
    }

    async fn get_by_metadata(
        &self,
        entity: EntityKind,
        filter: &MetadataFilter,
        exclusion: Option<&ExclusionEngine>,
    ) -> IngestResult<Vec<Artifact>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let (where_clause, owned_params) = build_metadata_where(entity, filter);
        let params = to_sql_refs(&owned_params);
        let artifacts = self.query_rows(entity, &where_clause, &params).await?;
        Ok(apply_exclusions(entity, artifacts, exclusion))
    }

    async fn delete_by_metadata(&self, entity: EntityKind, filter: &MetadataFilter) -> IngestResult<u64> {
        if filter.is_empty() {
            return Ok(0);
        }
        let (where_clause, owned_params) = build_metadata_where(entity, filter);
        let params = to_sql_refs(&owned_params);
        let conn = self.conn().await?;
        let sql = format!("DELETE FROM ingest_artifact {where_clause}");
        let deleted = conn.execute(&sql, &params).await.map_err(|e| IngestError::Other(e.into()))?;
        Ok(deleted)
    }

    async fn delete_by_entity_ids(&self, entity: EntityKind, entity_ids: &[String]) -> IngestResult<u64> {
        if entity_ids.is_empty() {
            return Ok(0);
        }
        let entity_str = entity.to_string();
        let ids: Vec<String> = entity_ids.to_vec();
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM ingest_artifact WHERE entity = $1 AND entity_id = ANY($2)",
                &[&entity_str, &ids],
            )
            .await
            .map_err(|e| IngestError::Other(e.into()))?;
        Ok(deleted)
    }
}

/// A boxed bind parameter, needed because the batch/range filter values have
/// heterogeneous owned types that must outlive the borrowed `ToSql` slice
/// passed to `tokio-postgres`.
type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Borrow a `Vec<BoxedParam>` down to the plain `&(dyn ToSql + Sync)` slice
/// `tokio-postgres` expects, dropping the `Send` bound kept on `BoxedParam`
/// only so these values can be held across `.await` points in `async-trait`
/// methods.
fn to_sql_refs(params: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| -> &(dyn ToSql + Sync) { p.as_ref() }).collect()
}

/// Build a `WHERE` clause plus owned bind parameters for a [`MetadataFilter`],
/// mirroring `artifact_repository.py::_build_metadata_filter` clause for
/// clause: `entity = $1`, then an optional `metadata @> $n::jsonb`
/// containment check, then one `metadata ->> $n = ANY($n+1)` pair per batch
/// entry, then one `(metadata ->> $n)::timestamptz BETWEEN $n+1 AND $n+2`
/// triple per range entry.
fn build_metadata_where(entity: EntityKind, filter: &MetadataFilter) -> (String, Vec<BoxedParam>) {
    let mut clause = String::from("WHERE entity = $1");
    let mut params: Vec<BoxedParam> = vec![Box::new(entity.to_string())];

    if let Some(equality) = &filter.equality {
        params.push(Box::new(equality.clone()));
        clause.push_str(&format!(" AND metadata @> ${}::jsonb", params.len()));
    }

    for (key, values) in &filter.batches {
        params.push(Box::new(key.clone()));
        let key_idx = params.len();
        params.push(Box::new(values.clone()));
        let values_idx = params.len();
        clause.push_str(&format!(" AND metadata ->> ${key_idx} = ANY(${values_idx})"));
    }

    for (key, (start, end)) in &filter.ranges {
        params.push(Box::new(key.clone()));
        let key_idx = params.len();
        params.push(Box::new(*start));
        let start_idx = params.len();
        params.push(Box::new(*end));
        let end_idx = params.len();
        clause.push_str(&format!(
            " AND (metadata ->> ${key_idx})::timestamptz BETWEEN ${start_idx} AND ${end_idx}"
        ));
    }

    (clause, params)
}
