//! Asana REST API wire models, grounded on `asana_api_models.py` and
//! `asana_permissions_models.py`. Distinct from `ingest_transform`'s task
//! document types: these mirror the raw API response shape exactly, while
//! the transform crate's types are the shape a document renderer consumes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifiedResource {
    pub gid: String,
    #[serde(default)]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedResource {
    pub gid: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaUser {
    pub gid: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

pub type AsanaWorkspace = NamedResource;
pub type AsanaTaskParent = NamedResource;
pub type AsanaSection = NamedResource;
pub type AsanaTag = NamedResource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaProject {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub privacy_setting: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

impl AsanaProject {
    /// A project is public when its privacy setting is anything other than
    /// the Asana "private to members" value.
    pub fn is_public(&self) -> bool {
        self.privacy_setting.as_deref() != Some("private_to_members")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaTeam {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub visibility: Option<String>,
}

impl AsanaTeam {
    pub fn is_public(&self) -> bool {
        matches!(self.visibility.as_deref(), Some("public") | Some("request_to_join"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaCustomField {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub display_value: Option<String>,
    #[serde(default)]
    pub people_value: Option<Vec<AsanaUser>>,
    #[serde(default)]
    pub reference_value: Option<Vec<NamedResource>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaTaskMembership {
    pub project: NamedResource,
    pub section: NamedResource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaTask {
    pub gid: String,
    pub name: String,
    pub permalink_url: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub parent: Option<AsanaTaskParent>,
    #[serde(default)]
    pub memberships: Vec<AsanaTaskMembership>,
    #[serde(default)]
    pub tags: Vec<AsanaTag>,
    pub resource_subtype: String,
    #[serde(default)]
    pub approval_status: Option<String>,
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub start_on: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub num_likes: i64,
    #[serde(default)]
    pub num_subtasks: i64,
    #[serde(default)]
    pub actual_time_minutes: Option<i64>,
    pub created_at: String,
    pub modified_at: String,
    #[serde(default)]
    pub assignee: Option<AsanaUser>,
    #[serde(default)]
    pub followers: Vec<AsanaUser>,
    #[serde(default)]
    pub created_by: Option<AsanaUser>,
    #[serde(default)]
    pub completed_by: Option<AsanaUser>,
    #[serde(default)]
    pub custom_fields: Vec<AsanaCustomField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryDates {
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub start_on: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaStory {
    pub gid: String,
    pub resource_subtype: String,
    #[serde(rename = "type")]
    pub story_type: String,
    pub created_at: String,
    #[serde(default)]
    pub created_by: Option<AsanaUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub num_likes: Option<i64>,
    #[serde(default)]
    pub old_dates: Option<StoryDates>,
    #[serde(default)]
    pub new_dates: Option<StoryDates>,
    #[serde(default)]
    pub assignee: Option<AsanaUser>,
    #[serde(default)]
    pub collaborator: Option<AsanaUser>,
    #[serde(default)]
    pub task: Option<NamedResource>,
    #[serde(default)]
    pub tag: Option<NamedResource>,
    #[serde(default)]
    pub project: Option<NamedResource>,
    #[serde(default)]
    pub new_section: Option<NamedResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaEventParent {
    #[serde(default)]
    pub gid: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub action: String,
    #[serde(default)]
    pub parent: Option<AsanaEventParent>,
    pub resource: IdentifiedResource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaNextPage {
    pub offset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaListRes<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next_page: Option<AsanaNextPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaEventListRes {
    pub data: Vec<AsanaEvent>,
    pub sync: String,
    #[serde(default)]
    pub has_more: bool,
}

/// The membership discriminated union from `asana_permissions_models.py`:
/// a project membership's `member` is either a user or a team, tagged by
/// `resource_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "resource_type", rename_all = "snake_case")]
pub enum MembershipMember {
    User(AsanaUser),
    Team(AsanaTeam),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaProjectMembership {
    pub member: MembershipMember,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaTeamMembership {
    pub user: AsanaUser,
}

/// Dedupe a list of gid-bearing resources, preserving first-seen order.
/// Mirrors `dedupe_asana_resources`.
pub fn dedupe_by_gid<T: Clone>(items: &[T], gid_of: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(gid_of(item).to_string()))
        .cloned()
        .collect()
}
