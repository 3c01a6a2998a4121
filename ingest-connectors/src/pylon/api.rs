//! Pylon HTTP client, grounded on `pylon_client_factory.py` and the
//! response shapes in `pylon_models.py`. Pylon exposes a single request
//! budget (no separate search tier), and every list endpoint shares one
//! opaque `cursor` pagination scheme rather than Asana's offset tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_client::{build_http_client, limiters_for, with_retry, ClientLimits, Page, RetryPolicy, SourceLimiters};
use ingest_core::{IngestError, IngestResult, TenantId};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::wire::{PylonAccount, PylonContact, PylonIssue, PylonListResponse, PylonTeam, PylonUser};

const BASE_URL: &str = "https://api.usepylon.com";
// Published limits: https://docs.usepylon.com/pylon-docs/developer/api/api-reference
// Undershoots the vendor's 100 req/10s ceiling so a backfill run never trips it.
const GENERAL_PER_MIN: u32 = 500;

/// Pylon API surface an extractor needs. Implemented by [`PylonHttpApi`]
/// against the live API, and by an in-memory fake in tests.
#[async_trait]
pub trait PylonApi: Send + Sync {
    async fn list_issues(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        cursor: Option<String>,
    ) -> IngestResult<Page<PylonIssue>>;

    async fn list_users(&self, cursor: Option<String>) -> IngestResult<Page<PylonUser>>;
    async fn list_teams(&self, cursor: Option<String>) -> IngestResult<Page<PylonTeam>>;
    async fn list_accounts(&self, cursor: Option<String>) -> IngestResult<Page<PylonAccount>>;
    async fn list_contacts(&self, cursor: Option<String>) -> IngestResult<Page<PylonContact>>;
}

pub struct PylonHttpApi {
    http: reqwest::Client,
    limiters: Arc<SourceLimiters>,
    retry_policy: RetryPolicy,
}

impl PylonHttpApi {
    pub fn new(tenant_id: TenantId, api_token: &str) -> reqwest::Result<Self> {
        let http = build_http_client(ClientLimits::default(), Some(api_token))?;
        let limiters = limiters_for(tenant_id, "pylon", GENERAL_PER_MIN, GENERAL_PER_MIN);
        Ok(Self { http, limiters, retry_policy: RetryPolicy::default() })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: Vec<(&'static str, String)>) -> IngestResult<T> {
        self.limiters.wait_general().await;
        let url = format!("{BASE_URL}{path}");
        let response = with_retry(&self.retry_policy, || {
            let url = url.clone();
            let query = query.clone();
            async move {
                let response = self.http.get(&url).query(&query).send().await.map_err(classify_transport_error)?;
                classify_status(response).await
            }
        })
        .await?;
        response.json::<T>().await.map_err(|e| IngestError::Other(e.into()))
    }

    async fn list_page<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&'static str, String)>,
        cursor: Option<String>,
    ) -> IngestResult<Page<T>> {
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let page: PylonListResponse<T> = self.get(path, query).await?;
        Ok(Page { items: page.data, next: page.cursor })
    }
}

fn classify_transport_error(err: reqwest::Error) -> IngestError {
    if err.is_timeout() || err.is_connect() {
        IngestError::RateLimited { retry_after: None }
    } else {
        IngestError::Other(err.into())
    }
}

async fn classify_status(response: reqwest::Response) -> IngestResult<reqwest::Response> {
    let status = response.status();

    if status.is_server_error() {
        return Err(IngestError::RateLimited { retry_after: None });
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(std::time::Duration::from_secs);
        return Err(IngestError::RateLimited { retry_after });
    }

    if status == reqwest::StatusCode::PAYMENT_REQUIRED {
        return Err(IngestError::PaymentRequired);
    }

    if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
        return Err(IngestError::NotFoundOrForbidden { entity_id: response.url().to_string() });
    }

    if status.is_client_error() {
        return Err(IngestError::Other(anyhow::anyhow!("pylon request failed: {status}")));
    }

    Ok(response)
}

#[async_trait]
impl PylonApi for PylonHttpApi {
    async fn list_issues(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        cursor: Option<String>,
    ) -> IngestResult<Page<PylonIssue>> {
        let query = vec![
            ("start_time", start_time.to_rfc3339()),
            ("end_time", end_time.to_rfc3339()),
        ];
        self.list_page("/issues", query, cursor).await
    }

    async fn list_users(&self, cursor: Option<String>) -> IngestResult<Page<PylonUser>> {
        self.list_page("/users", Vec::new(), cursor).await
    }

    async fn list_teams(&self, cursor: Option<String>) -> IngestResult<Page<PylonTeam>> {
        self.list_page("/teams", Vec::new(), cursor).await
    }

    async fn list_accounts(&self, cursor: Option<String>) -> IngestResult<Page<PylonAccount>> {
        self.list_page("/accounts", Vec::new(), cursor).await
    }

    async fn list_contacts(&self, cursor: Option<String>) -> IngestResult<Page<PylonContact>> {
        self.list_page("/contacts", Vec::new(), cursor).await
    }
}
