//! Shared enumerations for the ingestion data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of entity an artifact or document represents.
///
/// Connectors are hand-written per source (this is not a generic ETL
/// framework), so most variants here exist without a live extractor yet.
/// Asana, Pylon, a generic ticket-tracker shape, and Custom Data have full
/// extractor and transformer implementations; the rest are reserved for
/// connectors that have not been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    // Asana
    AsanaTask,
    AsanaProject,
    AsanaUser,
    AsanaTeam,
    AsanaWorkspace,
    /// A single activity story (comment or system update) on a task,
    /// stored as its own artifact row so a task's activity can be pruned
    /// in bulk by `task_gid` without touching the task artifact itself.
    AsanaTaskStory,
    /// Snapshot of a project's member users and teams, force-upserted since
    /// Asana exposes no native timestamp to drive monotonic upserts.
    AsanaProjectPermissions,
    /// Snapshot of a team's member users, force-upserted for the same
    /// reason as `AsanaProjectPermissions`.
    AsanaTeamPermissions,
    // Pylon
    PylonIssue,
    PylonAccount,
    PylonContact,
    PylonUser,
    PylonTeam,
    // Generic ticket tracker shape (ClickUp-like)
    TrackerTask,
    /// A single comment on a tracker task, stored as its own artifact row
    /// so a task's activity can be pruned in bulk by `task_id` without
    /// touching the task artifact itself (mirrors `AsanaTaskStory`).
    TrackerComment,
    TrackerList,
    TrackerSpace,
    TrackerUser,
    /// Snapshot of a list's member users, force-upserted since the tracker
    /// exposes no native timestamp on membership the way it does on tasks.
    TrackerListMembership,
    // Custom data (push-style, tenant supplied)
    CustomDataItem,
    // Reserved for connectors not yet implemented.
    GithubFile,
    GithubIssue,
    GithubPullRequest,
    SlackChannel,
    SlackMessage,
    LinearIssue,
    NotionPage,
    GmailMessage,
}

impl EntityKind {
    /// The vendor family this kind belongs to, used for grouping exclusion
    /// rules and client instances.
    pub fn source(&self) -> &'static str {
        match self {
            EntityKind::AsanaTask
            | EntityKind::AsanaProject
            | EntityKind::AsanaUser
            | EntityKind::AsanaTeam
            | EntityKind::AsanaWorkspace
            | EntityKind::AsanaTaskStory
            | EntityKind::AsanaProjectPermissions
            | EntityKind::AsanaTeamPermissions => "asana",
            EntityKind::PylonIssue
            | EntityKind::PylonAccount
            | EntityKind::PylonContact
            | EntityKind::PylonUser
            | EntityKind::PylonTeam => "pylon",
            EntityKind::TrackerTask
            | EntityKind::TrackerComment
            | EntityKind::TrackerList
            | EntityKind::TrackerSpace
            | EntityKind::TrackerUser
            | EntityKind::TrackerListMembership => "tracker",
            EntityKind::CustomDataItem => "custom_data",
            EntityKind::GithubFile | EntityKind::GithubIssue | EntityKind::GithubPullRequest => {
                "github"
            }
            EntityKind::SlackChannel | EntityKind::SlackMessage => "slack",
            EntityKind::LinearIssue => "linear",
            EntityKind::NotionPage => "notion",
            EntityKind::GmailMessage => "gmail",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", json.as_str().unwrap_or("unknown"))
    }
}

/// Permission policy attached to a transformed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Visible to every member of the owning tenant; no allowed-tokens list.
    Tenant,
    /// Visible only to principals whose permission token appears in the
    /// document's allowed-tokens list.
    Private,
}

/// The metric a usage record or quota check is tracking, matching the
/// `METRIC_TYPES` constant in the original usage tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    Requests,
    InputTokens,
    OutputTokens,
    EmbeddingTokens,
}

impl fmt::Display for UsageMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageMetric::Requests => write!(f, "requests"),
            UsageMetric::InputTokens => write!(f, "input_tokens"),
            UsageMetric::OutputTokens => write!(f, "output_tokens"),
            UsageMetric::EmbeddingTokens => write!(f, "embedding_tokens"),
        }
    }
}

/// The upstream source a usage record is attributed to, matching the
/// `SOURCE_TYPES` constant in the original usage tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    Backfill,
    Search,
    AgentQuery,
    Indexing,
}

impl fmt::Display for UsageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageSource::Backfill => write!(f, "backfill"),
            UsageSource::Search => write!(f, "search"),
            UsageSource::AgentQuery => write!(f, "agent_query"),
            UsageSource::Indexing => write!(f, "indexing"),
        }
    }
}

/// Billing tier, used to decide whether a quota-exceeding request should
/// still be allowed (e.g. an expired trial is allowed through but flagged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingTier {
    Trial,
    ExpiredTrial,
    Paid,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_source_grouping() {
        assert_eq!(EntityKind::AsanaTask.source(), "asana");
        assert_eq!(EntityKind::PylonIssue.source(), "pylon");
        assert_eq!(EntityKind::CustomDataItem.source(), "custom_data");
    }

    #[test]
    fn entity_kind_display_is_snake_case() {
        assert_eq!(EntityKind::AsanaTask.to_string(), "asana_task");
    }
}
