//! Pylon API response models, grounded on `pylon_models.py`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub emails: Option<Vec<String>>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonContactRef {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonContact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub emails: Option<Vec<String>>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub portal_role: Option<String>,
    #[serde(default)]
    pub portal_role_id: Option<String>,
    #[serde(default)]
    pub account: Option<serde_json::Value>,
    #[serde(default)]
    pub custom_fields: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonChannel {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub is_primary: Option<bool>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub mirror_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonExternalId {
    pub external_id: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonOwner {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domains: Option<Vec<String>>,
    #[serde(default)]
    pub primary_domain: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner: Option<PylonOwner>,
    #[serde(default)]
    pub subaccount_ids: Option<Vec<String>>,
    #[serde(default)]
    pub channels: Option<Vec<PylonChannel>>,
    #[serde(default)]
    pub external_ids: Option<Vec<PylonExternalId>>,
    #[serde(default)]
    pub custom_fields: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub latest_customer_activity_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonAssignee {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonTeamUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonTeam {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub users: Option<Vec<PylonTeamUser>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonRequester {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonCsatResponse {
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonExternalIssue {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonAccountRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PylonIssue {
    pub id: String,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub latest_message_time: Option<String>,
    #[serde(default)]
    pub first_response_time: Option<String>,
    #[serde(default)]
    pub resolution_time: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub customer_portal_visible: Option<bool>,
    #[serde(default)]
    pub assignee: Option<PylonAssignee>,
    #[serde(default)]
    pub requester: Option<PylonRequester>,
    #[serde(default)]
    pub account: Option<PylonAccountRef>,
    #[serde(default)]
    pub team: Option<PylonTeam>,
    #[serde(default)]
    pub external_issues: Option<Vec<PylonExternalIssue>>,
    #[serde(default)]
    pub csat_responses: Option<Vec<PylonCsatResponse>>,
    #[serde(default)]
    pub custom_fields: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PylonListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub cursor: Option<String>,
}
