//! Wire models for a generic, ClickUp-shaped ticket-tracker API: teams
//! (workspaces) containing spaces, spaces containing lists, lists
//! containing tasks, and tasks carrying comments. Field names follow
//! ClickUp's own REST API (`date_updated`/`date_created` as millisecond
//! epoch strings, `assignees`/`watchers` as user arrays, a `custom_fields`
//! array keyed by field name).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerTeam {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSpace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub space: Option<TrackerSpaceRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSpaceRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerCustomField {
    pub name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TrackerStatus,
    #[serde(default)]
    pub priority: Option<TrackerPriority>,
    pub list: TrackerListRef,
    #[serde(default)]
    pub assignees: Vec<TrackerUser>,
    #[serde(default)]
    pub watchers: Vec<TrackerUser>,
    #[serde(default)]
    pub tags: Vec<TrackerTag>,
    pub date_created: String,
    pub date_updated: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<TrackerCustomField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerPriority {
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerListRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerTag {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerComment {
    pub id: String,
    pub comment_text: String,
    #[serde(default)]
    pub user: Option<TrackerUser>,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackerTeamsResponse {
    pub teams: Vec<TrackerTeam>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackerSpacesResponse {
    pub spaces: Vec<TrackerSpace>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackerListsResponse {
    pub lists: Vec<TrackerList>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackerTasksResponse {
    pub tasks: Vec<TrackerTask>,
    #[serde(default)]
    pub last_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackerCommentsResponse {
    pub comments: Vec<TrackerComment>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackerMembersResponse {
    pub members: Vec<TrackerUser>,
}
