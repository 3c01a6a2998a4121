//! Daemon configuration: per-tenant credentials and connection strings
//! load from an optional TOML file, layered under scalar process settings
//! read from the environment — a file layer on top of the usual
//! env-vars-only shape, since per-tenant secrets don't fit comfortably
//! into flat env vars.

use ingest_core::TenantId;
use serde::Deserialize;
use std::time::Duration;

/// One configured tenant: which sources are enabled for it, the
/// credentials each needs, and the Postgres connection string for its
/// artifact/sync-state schema.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    /// `postgres://...` connection string for this tenant's schema.
    pub database_url: String,
    #[serde(default)]
    pub asana_access_token: Option<String>,
    #[serde(default)]
    pub pylon_api_token: Option<String>,
    #[serde(default)]
    pub tracker_api_token: Option<String>,
    #[serde(default)]
    pub custom_data_enabled: bool,
}

impl TenantConfig {
    pub fn asana_enabled(&self) -> bool {
        self.asana_access_token.is_some()
    }

    pub fn pylon_enabled(&self) -> bool {
        self.pylon_api_token.is_some()
    }

    pub fn tracker_enabled(&self) -> bool {
        self.tracker_api_token.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TenantsFile {
    #[serde(default)]
    tenants: Vec<TenantConfig>,
}

/// Daemon-wide settings. Scalar fields come from the environment with
/// sensible defaults; the tenant roster comes from a TOML file since it
/// carries per-tenant secrets and isn't practical to express as flat env
/// vars.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub tenants: Vec<TenantConfig>,
    pub worker_concurrency: usize,
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
    pub full_backfill_duration: Duration,
    pub pylon_lookback_hours: u32,
}

impl IngestConfig {
    /// Environment variables:
    /// - `INGEST_CONFIG_PATH`: path to the tenants TOML file (default: `config.toml`)
    /// - `INGEST_WORKER_CONCURRENCY`: concurrent job workers (default: 4)
    /// - `INGEST_VISIBILITY_TIMEOUT_SECS`: queue visibility timeout (default: 780, matching SQS's 13-minute undershoot of the 15-minute hard limit)
    /// - `INGEST_POLL_INTERVAL_MS`: idle poll interval when the queue is empty (default: 2000)
    /// - `INGEST_FULL_BACKFILL_DURATION_SECS`: time budget for one full-backfill job invocation (default: 780)
    /// - `INGEST_PYLON_LOOKBACK_HOURS`: incremental lookback window for a cold Pylon cursor (default: 2)
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("INGEST_CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let tenants = match std::fs::read_to_string(&config_path) {
            Ok(raw) => {
                let file: TenantsFile = toml::from_str(&raw)?;
                file.tenants
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %config_path, "no tenants config file found, starting with an empty roster");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            tenants,
            worker_concurrency: env_parse("INGEST_WORKER_CONCURRENCY", 4),
            visibility_timeout: Duration::from_secs(env_parse("INGEST_VISIBILITY_TIMEOUT_SECS", 780)),
            poll_interval: Duration::from_millis(env_parse("INGEST_POLL_INTERVAL_MS", 2000)),
            full_backfill_duration: Duration::from_secs(env_parse("INGEST_FULL_BACKFILL_DURATION_SECS", 780)),
            pylon_lookback_hours: env_parse("INGEST_PYLON_LOOKBACK_HOURS", 2),
        })
    }

    pub fn tenant(&self, tenant_id: TenantId) -> Option<&TenantConfig> {
        self.tenants.iter().find(|t| t.tenant_id == tenant_id)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::EntityIdType;

    #[test]
    fn tenant_lookup_finds_a_configured_tenant_by_id() {
        let tenant_id = TenantId::now_v7();
        let config = IngestConfig {
            tenants: vec![TenantConfig {
                tenant_id,
                database_url: "postgres://localhost/tenant".to_string(),
                asana_access_token: Some("token".to_string()),
                pylon_api_token: None,
                tracker_api_token: None,
                custom_data_enabled: true,
            }],
            worker_concurrency: 4,
            visibility_timeout: Duration::from_secs(780),
            poll_interval: Duration::from_millis(2000),
            full_backfill_duration: Duration::from_secs(780),
            pylon_lookback_hours: 2,
        };

        assert!(config.tenant(tenant_id).is_some());
        assert!(config.tenant(TenantId::now_v7()).is_none());
    }
}
