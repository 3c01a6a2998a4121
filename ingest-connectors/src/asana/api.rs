//! Asana HTTP client, grounded on `asana_client.py`: base url, endpoint
//! paths, rate limits, and the three vendor error classes it distinguishes
//! from a plain failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_client::{
    build_http_client, limiters_for, with_retry, ClientLimits, Page, RetryPolicy, SourceLimiters,
    SweepItem, VendorError,
};
use ingest_core::{IngestError, IngestResult, TenantId};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use super::wire::{
    AsanaEvent, AsanaListRes, AsanaProject, AsanaProjectMembership, AsanaStory, AsanaTask,
    AsanaTeamMembership, AsanaWorkspace,
};

const BASE_URL: &str = "https://app.asana.com/api/1.0";
// https://developers.asana.com/docs/rate-limits#standard-rate-limits
// Standard limit is 1500/min, search limit is 60/min; both undershot so a
// full and incremental backfill can run concurrently against the same
// tenant without tripping the vendor's own limiter.
const GENERAL_PER_MIN: u32 = 600;
const SEARCH_PER_MIN: u32 = 20;

impl SweepItem for AsanaTask {
    fn sweep_id(&self) -> &str {
        &self.gid
    }

    fn modified_at(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&self.modified_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<AsanaEvent>,
    pub sync: String,
    pub has_more: bool,
}

/// Asana API surface an extractor needs. Implemented by [`AsanaHttpApi`]
/// against the live API, and by an in-memory fake in tests.
#[async_trait]
pub trait AsanaApi: Send + Sync {
    async fn list_workspaces(&self, offset: Option<String>) -> IngestResult<Page<AsanaWorkspace>>;
    async fn list_projects(
        &self,
        workspace_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaProject>>;

    /// One descending page of `modified_at`-sorted search results. Callers
    /// drive the sweep with [`ingest_client::sweep_descending`].
    async fn search_tasks(
        &self,
        workspace_gid: &str,
        modified_at_before: DateTime<Utc>,
        modified_at_after: Option<DateTime<Utc>>,
        project_gid: Option<&str>,
    ) -> IngestResult<Vec<AsanaTask>>;

    async fn get_task(&self, task_gid: &str) -> IngestResult<AsanaTask>;
    async fn list_stories(
        &self,
        task_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaStory>>;
    async fn list_project_memberships(
        &self,
        project_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaProjectMembership>>;
    async fn list_team_memberships(
        &self,
        team_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaTeamMembership>>;

    /// One page of workspace events. Fetching a sync token for the first
    /// time, or after a long gap, returns
    /// [`VendorError::InvalidSyncToken`] carrying a fresh token.
    async fn list_workspace_events(
        &self,
        workspace_gid: &str,
        sync_token: Option<&str>,
    ) -> Result<EventPage, VendorError>;
    async fn list_project_events(
        &self,
        project_gid: &str,
        sync_token: Option<&str>,
    ) -> Result<EventPage, VendorError>;
}

pub struct AsanaHttpApi {
    http: reqwest::Client,
    limiters: Arc<SourceLimiters>,
    retry_policy: RetryPolicy,
}

impl AsanaHttpApi {
    pub fn new(tenant_id: TenantId, access_token: Option<&str>) -> reqwest::Result<Self> {
        let http = build_http_client(ClientLimits::default(), access_token)?;
        let limiters = limiters_for(tenant_id, "asana", GENERAL_PER_MIN, SEARCH_PER_MIN);
        Ok(Self { http, limiters, retry_policy: RetryPolicy::default() })
    }

    fn url(path: &str) -> String {
        format!("{BASE_URL}{path}")
    }

    async fn send(&self, path: &str, query: Vec<(&'static str, String)>) -> IngestResult<reqwest::Response> {
        let url = Self::url(path);
        with_retry(&self.retry_policy, || {
            let url = url.clone();
            let query = query.clone();
            async move {
                let response = self
                    .http
                    .get(&url)
                    .query(&query)
                    .send()
                    .await
                    .map_err(classify_transport_error)?;
                classify_status(response).await
            }
        })
        .await
    }

    /// Like [`Self::send`] but on the tighter search bucket, and without
    /// promoting a 402 to a generic failure — the caller needs to
    /// distinguish "premium feature" from a hard error.
    async fn send_search(
        &self,
        path: &str,
        query: Vec<(&'static str, String)>,
    ) -> Result<reqwest::Response, VendorError> {
        self.limiters.wait_search().await;
        let url = Self::url(path);
        let response = self.http.get(&url).query(&query).send().await.map_err(classify_transport_error)?;
        if response.status() == reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(VendorError::PaymentRequired("search is a premium-only feature".into()));
        }
        classify_status(response).await.map_err(VendorError::Other)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: Vec<(&'static str, String)>) -> IngestResult<T> {
        self.limiters.wait_general().await;
        let response = self.send(path, query).await?;
        response.json::<T>().await.map_err(|e| IngestError::Other(e.into()))
    }

    async fn list_events(
        &self,
        path: &str,
        sync_token: Option<&str>,
    ) -> Result<EventPage, VendorError> {
        self.limiters.wait_general().await;
        let mut query = Vec::new();
        if let Some(token) = sync_token {
            query.push(("sync", token.to_string()));
        }

        let url = Self::url(path);
        let response = self.http.get(&url).query(&query).send().await.map_err(classify_transport_error)?;

        if response.status().is_client_error() {
            let status = response.status();
            let body: AsanaErrorBody = response.json().await.unwrap_or_default();
            if body.sync.is_some() || status == reqwest::StatusCode::BAD_REQUEST && !body.errors.is_empty() {
                if body.errors.iter().any(|e| e.error.as_deref() == Some("only_service_account_can_access")) {
                    return Err(VendorError::ServiceAccountOnly(
                        "resource requires a service account".into(),
                    ));
                }
                return Err(VendorError::InvalidSyncToken { fresh_sync_token: body.sync });
            }
            if body.errors.iter().any(|e| e.error.as_deref() == Some("only_service_account_can_access")) {
                return Err(VendorError::ServiceAccountOnly("resource requires a service account".into()));
            }
            if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
                return Err(VendorError::NotFoundOrForbidden(path.to_string()));
            }
            return Err(VendorError::Other(IngestError::Other(anyhow::anyhow!(
                "asana events request failed: {status}"
            ))));
        }

        let page: RawEventPage = response.json().await.map_err(|e| VendorError::Other(IngestError::Other(e.into())))?;
        Ok(EventPage { events: page.data, sync: page.sync, has_more: page.has_more })
    }
}

#[derive(Debug, Default, Deserialize)]
struct AsanaErrorBody {
    #[serde(default)]
    errors: Vec<AsanaErrorDetail>,
    #[serde(default)]
    sync: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsanaErrorDetail {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEventPage {
    data: Vec<AsanaEvent>,
    #[serde(default)]
    sync: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
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

    if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
        return Err(IngestError::NotFoundOrForbidden { entity_id: response.url().to_string() });
    }

    if status.is_client_error() {
        return Err(IngestError::Other(anyhow::anyhow!("asana request failed: {status}")));
    }

    Ok(response)
}

#[async_trait]
impl AsanaApi for AsanaHttpApi {
    async fn list_workspaces(&self, offset: Option<String>) -> IngestResult<Page<AsanaWorkspace>> {
        let mut query = vec![("limit", "100".to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }
        let page: AsanaListRes<AsanaWorkspace> = self.get("/workspaces", query).await?;
        Ok(Page { items: page.data, next: page.next_page.map(|p| p.offset) })
    }

    async fn list_projects(
        &self,
        workspace_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaProject>> {
        let mut query = vec![("limit", "100".to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }
        let path = format!("/workspaces/{workspace_gid}/projects");
        let page: AsanaListRes<AsanaProject> = self.get(&path, query).await?;
        Ok(Page { items: page.data, next: page.next_page.map(|p| p.offset) })
    }

    async fn search_tasks(
        &self,
        workspace_gid: &str,
        modified_at_before: DateTime<Utc>,
        modified_at_after: Option<DateTime<Utc>>,
        project_gid: Option<&str>,
    ) -> IngestResult<Vec<AsanaTask>> {
        let mut query = vec![
            ("limit", "100".to_string()),
            ("sort_by", "modified_at".to_string()),
            ("sort_ascending", "false".to_string()),
            ("modified_at.before", modified_at_before.to_rfc3339()),
        ];
        if let Some(after) = modified_at_after {
            query.push(("modified_at.after", after.to_rfc3339()));
        }
        if let Some(project_gid) = project_gid {
            query.push(("projects.any", project_gid.to_string()));
        }

        let path = format!("/workspaces/{workspace_gid}/tasks/search");
        let result: Result<Envelope<Vec<AsanaTask>>, VendorError> = async {
            let response = self.send_search(&path, query).await?;
            response.json().await.map_err(|e| VendorError::Other(IngestError::Other(e.into())))
        }
        .await;

        match result {
            Ok(envelope) => Ok(envelope.data),
            Err(vendor_err) => Err(vendor_err.into()),
        }
    }

    async fn get_task(&self, task_gid: &str) -> IngestResult<AsanaTask> {
        let path = format!("/tasks/{task_gid}");
        let envelope: Envelope<AsanaTask> = self.get(&path, Vec::new()).await?;
        Ok(envelope.data)
    }

    async fn list_stories(
        &self,
        task_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaStory>> {
        let mut query = vec![("limit", "100".to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }
        let path = format!("/tasks/{task_gid}/stories");
        let page: AsanaListRes<AsanaStory> = self.get(&path, query).await?;
        Ok(Page { items: page.data, next: page.next_page.map(|p| p.offset) })
    }

    async fn list_project_memberships(
        &self,
        project_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaProjectMembership>> {
        let mut query = vec![("limit", "100".to_string()), ("parent", project_gid.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }
        let page: AsanaListRes<AsanaProjectMembership> = self.get("/memberships", query).await?;
        Ok(Page { items: page.data, next: page.next_page.map(|p| p.offset) })
    }

    async fn list_team_memberships(
        &self,
        team_gid: &str,
        offset: Option<String>,
    ) -> IngestResult<Page<AsanaTeamMembership>> {
        let mut query = vec![("limit", "100".to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }
        let path = format!("/teams/{team_gid}/team_memberships");
        let page: AsanaListRes<AsanaTeamMembership> = self.get(&path, query).await?;
        Ok(Page { items: page.data, next: page.next_page.map(|p| p.offset) })
    }

    async fn list_workspace_events(
        &self,
        workspace_gid: &str,
        sync_token: Option<&str>,
    ) -> Result<EventPage, VendorError> {
        let path = format!("/workspaces/{workspace_gid}/events");
        self.list_events(&path, sync_token).await
    }

    async fn list_project_events(
        &self,
        project_gid: &str,
        sync_token: Option<&str>,
    ) -> Result<EventPage, VendorError> {
        let path = format!("/projects/{project_gid}/events");
        self.list_events(&path, sync_token).await
    }
}
