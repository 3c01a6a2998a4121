//! Asana task document transformer, grounded on
//! `asana_task_document.py`: renders a task artifact plus its activity
//! (story) artifacts into a header, a body, and an embedding-ready chunk
//! set, and derives the document's permission policy from the visibility
//! of the projects and teams the task belongs to.

use ingest_core::{deterministic_chunk_id, Chunk, DocumentId, EntityKind, IngestError, IngestResult, PermissionPolicy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunking::{split_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATORS};
use crate::content_hash::compute_chunk_content_hash;
use crate::permission_token::{is_valid_permission_token, make_email_permission_token};

const DOCUMENT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x11, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

/// Deterministic document id derived from a source-native reference key
/// such as `"asana_task_{gid}"`, so re-transforming the same entity always
/// produces the same document id.
pub fn deterministic_document_id(reference_key: &str) -> DocumentId {
    DocumentId::new(Uuid::new_v5(&DOCUMENT_ID_NAMESPACE, reference_key.as_bytes()))
}

/// `{gid, name}` pair shared by projects, sections, tags, workspaces, and
/// parent tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedResource {
    pub gid: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaUser {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub name: String,
    #[serde(default)]
    pub people_value: Option<Vec<AsanaUser>>,
    #[serde(default)]
    pub reference_value: Option<Vec<NamedResource>>,
    #[serde(default)]
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    #[serde(default)]
    pub section: Option<NamedResource>,
    #[serde(default)]
    pub project: Option<NamedResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaTaskFields {
    pub gid: String,
    pub name: String,
    pub permalink_url: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub parent: Option<NamedResource>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub tags: Vec<NamedResource>,
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
    pub custom_fields: Vec<CustomFieldValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaTaskContent {
    pub task: AsanaTaskFields,
    pub workspace: NamedResource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start_on: Option<String>,
    #[serde(default)]
    pub due_on: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaStoryContent {
    pub gid: String,
    #[serde(rename = "type")]
    pub story_type: String,
    pub resource_subtype: String,
    pub created_at: String,
    #[serde(default)]
    pub created_by: Option<AsanaUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub num_likes: Option<i64>,
    #[serde(default)]
    pub assignee: Option<AsanaUser>,
    #[serde(default)]
    pub collaborator: Option<AsanaUser>,
    #[serde(default)]
    pub task: Option<NamedResource>,
    #[serde(default)]
    pub project: Option<NamedResource>,
    #[serde(default)]
    pub tag: Option<NamedResource>,
    #[serde(default)]
    pub new_section: Option<NamedResource>,
    #[serde(default)]
    pub old_dates: Option<DateRange>,
    #[serde(default)]
    pub new_dates: Option<DateRange>,
}

/// A fully rendered Asana task document, ready for persistence downstream.
/// `metadata` mirrors the filterable fields extracted alongside an
/// artifact's free-form `content` (task name, project gids, assignee,
/// etc.) so a search layer can filter without re-parsing the body.
#[derive(Debug, Clone)]
pub struct AsanaTaskDocument {
    pub id: DocumentId,
    pub reference_id: String,
    pub entity: EntityKind,
    pub entity_id: String,
    pub permission_policy: PermissionPolicy,
    pub permission_allowed_tokens: Vec<String>,
    pub header: String,
    pub body: String,
    pub chunks: Vec<Chunk>,
    pub metadata: serde_json::Value,
}

fn opt_or_none_literal<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "None".to_string(),
    }
}

fn named_content(named: Option<&NamedResource>) -> String {
    match named {
        None => String::new(),
        Some(named) => format!("<@{}|@{}>", named.name, named.gid),
    }
}

fn user_content(user: Option<&AsanaUser>) -> String {
    let Some(user) = user else { return String::new() };
    let name_likely_email = user.name.contains('@');
    let name = if name_likely_email { user.name.clone() } else { format!("@{}", user.name) };
    let email = user.email.clone().unwrap_or_default();
    let id = format!("@{}", user.gid);
    format!("<{}|{}|{}>", name, email, id)
}

fn join_named(items: &[NamedResource]) -> String {
    items.iter().map(|n| named_content(Some(n))).collect::<Vec<_>>().join(", ")
}

fn join_users(items: &[AsanaUser]) -> String {
    items.iter().map(|u| user_content(Some(u))).collect::<Vec<_>>().join(", ")
}

fn header_content(task_content: &AsanaTaskContent) -> String {
    let task = &task_content.task;

    let people_custom_field_lines: Vec<String> = task
        .custom_fields
        .iter()
        .filter_map(|field| {
            field.people_value.as_ref().map(|people| format!("- {}: {}", field.name, join_users(people)))
        })
        .collect();

    let referenced_custom_field_lines: Vec<String> = task
        .custom_fields
        .iter()
        .filter_map(|field| {
            field.reference_value.as_ref().map(|refs| format!("- {}: {}", field.name, join_named(refs)))
        })
        .collect();

    let other_custom_field_lines: Vec<String> = task
        .custom_fields
        .iter()
        .filter(|field| field.people_value.is_none() && field.reference_value.is_none())
        .map(|field| format!("- {}: {}", field.name, field.display_value.clone().unwrap_or_default()))
        .collect();

    let sections: Vec<NamedResource> =
        task.memberships.iter().filter_map(|m| m.section.clone()).collect();
    let projects: Vec<NamedResource> =
        task.memberships.iter().filter_map(|m| m.project.clone()).collect();

    let mut lines = vec![
        "# Asana Task".to_string(),
        format!("- Task: <@{}|@{}>", task.name, task.gid),
        format!("- Parent Task: {}", named_content(task.parent.as_ref())),
        format!("- Sections: {}", join_named(&sections)),
        format!("- Projects: {}", join_named(&projects)),
        format!("- Workspace: {}", named_content(Some(&task_content.workspace))),
        format!("- Tags: {}", join_named(&task.tags)),
        format!("- Subtype: {}", task.resource_subtype),
        format!("- Approval Status: {}", opt_or_none_literal(&task.approval_status)),
        format!("- Due On: {}", opt_or_none_literal(&task.due_on)),
        format!("- Start On: {}", opt_or_none_literal(&task.start_on)),
        format!("- Completed At: {}", opt_or_none_literal(&task.completed_at)),
        format!("- Likes: {}", task.num_likes),
        format!("- Subtasks: {}", task.num_subtasks),
        format!("- Logged Time Minutes: {}", opt_or_none_literal(&task.actual_time_minutes)),
        format!("- Permalink: {}", task.permalink_url),
        format!("- Created At: {}", task.created_at),
        format!("- Modified At: {}", task.modified_at),
        "## People involved".to_string(),
        format!("- Assignee: {}", user_content(task.assignee.as_ref())),
        format!("- Collaborators: {}", join_users(&task.followers)),
        format!("- Created By: {}", user_content(task.created_by.as_ref())),
        format!("- Completed By: {}", user_content(task.completed_by.as_ref())),
    ];
    lines.extend(people_custom_field_lines);
    lines.push("## Additional Details".to_string());
    lines.extend(referenced_custom_field_lines);
    lines.extend(other_custom_field_lines);
    lines.join("\n")
}

fn story_due_date_changed_content(story: &AsanaStoryContent) -> String {
    let author = user_content(story.created_by.as_ref());
    let (Some(old_dates), Some(new_dates)) = (&story.old_dates, &story.new_dates) else {
        return format!("{} changed the date range.", author);
    };

    let start_on_action = match (new_dates.start_on.as_deref(), old_dates.start_on.as_deref()) {
        (Some(new), None) => Some(format!("set start date to {}", new)),
        (None, Some(_)) => Some("removed start date".to_string()),
        (new, old) if new != old => new.map(|n| format!("changed start date to {}", n)),
        _ => None,
    };

    let due_on_action = match (new_dates.due_on.as_deref(), old_dates.due_on.as_deref()) {
        (Some(new), None) => Some(format!("set due date to {}", new)),
        (None, Some(_)) => Some("removed due date".to_string()),
        (new, old) if new != old => new.map(|n| format!("changed due date to {}", n)),
        _ => None,
    };

    if start_on_action.is_none() && due_on_action.is_none() {
        return format!("{} changed the date range.", author);
    }

    let mut out = author;
    if let Some(start) = &start_on_action {
        out.push(' ');
        out.push_str(start);
    }
    if start_on_action.is_some() && due_on_action.is_some() {
        out.push_str(" and");
    }
    if let Some(due) = &due_on_action {
        out.push(' ');
        out.push_str(due);
    }
    out
}

fn story_content(story: &AsanaStoryContent) -> String {
    let author = || user_content(story.created_by.as_ref());
    match story.resource_subtype.as_str() {
        "assigned" => format!("{} assigned this task to {}.", author(), user_content(story.assignee.as_ref())),
        "collaborator_added" => {
            format!("{} added {} as a collaborator.", author(), user_content(story.collaborator.as_ref()))
        }
        "added_to_task" => {
            format!("{} added this task to {} as a subtask.", author(), named_content(story.task.as_ref()))
        }
        "removed_from_task" => {
            format!("{} removed this task from task {}.", author(), named_content(story.task.as_ref()))
        }
        "added_to_project" => {
            format!("{} added this task to project {}.", author(), named_content(story.project.as_ref()))
        }
        "removed_from_project" => {
            format!("{} removed this task from project {}.", author(), named_content(story.project.as_ref()))
        }
        "added_to_tag" => format!("{} added this task to tag {}.", author(), named_content(story.tag.as_ref())),
        "removed_from_tag" => {
            format!("{} removed this task from tag {}.", author(), named_content(story.tag.as_ref()))
        }
        "due_date_changed" => story_due_date_changed_content(story),
        "section_changed" => {
            format!("{} moved this task to section {}.", author(), named_content(story.new_section.as_ref()))
        }
        _ => story
            .text
            .clone()
            .unwrap_or_else(|| format!("{} {} on this task.", author(), story.resource_subtype)),
    }
}

fn sort_by_created_at_desc(stories: &mut Vec<&AsanaStoryContent>) {
    stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn stories_content(stories: &[AsanaStoryContent]) -> String {
    let mut non_comments: Vec<&AsanaStoryContent> =
        stories.iter().filter(|s| s.story_type != "comment").collect();
    sort_by_created_at_desc(&mut non_comments);

    non_comments
        .iter()
        .map(|story| {
            format!(
                "### Update\n{}\n- Performed By: {}\n- Performed At: {}",
                story_content(story),
                user_content(story.created_by.as_ref()),
                story.created_at
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn comments_content(stories: &[AsanaStoryContent]) -> String {
    let mut comments: Vec<&AsanaStoryContent> =
        stories.iter().filter(|s| s.story_type == "comment").collect();
    sort_by_created_at_desc(&mut comments);

    comments
        .iter()
        .map(|story| {
            format!(
                "### Comment\n{}\n- Author: {}\n- Timestamp: {}\n- Likes: {}",
                story.text.clone().unwrap_or_default(),
                user_content(story.created_by.as_ref()),
                story.created_at,
                story.num_likes.unwrap_or(0)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render the full body of a task document: header, description, activity
/// stories, and comments, in that order.
pub fn render_body(task_content: &AsanaTaskContent, stories: &[AsanaStoryContent]) -> String {
    let header = header_content(task_content);
    let description = task_content.task.notes.clone().unwrap_or_else(|| "No description provided.".to_string());
    format!(
        "{}\n\n## Task Description\n{}\n\n## Stories:\n{}\n\n## Comments:\n{}",
        header,
        description,
        stories_content(stories),
        comments_content(stories),
    )
}

/// Derive the permission policy and allowed-tokens list for a task,
/// following `AsanaTaskDocument.from_artifacts`: a task is tenant-visible
/// if any of its projects is public, or any of its projects' teams is
/// public; otherwise it is private to its assignee, its followers, and
/// every member of the projects it belongs to.
///
/// Every produced token must pass `is_valid_permission_token`; the first
/// one that doesn't aborts construction, matching
/// `base_document.py.__post_init__`'s `ValueError` on an invalid token.
pub fn derive_permissions(
    is_public: bool,
    task_content: &AsanaTaskContent,
    project_members: &[AsanaUser],
) -> IngestResult<(PermissionPolicy, Vec<String>)> {
    if is_public {
        return Ok((PermissionPolicy::Tenant, Vec::new()));
    }

    let mut candidates: Vec<&AsanaUser> = task_content.task.followers.iter().collect();
    if let Some(assignee) = &task_content.task.assignee {
        candidates.push(assignee);
    }
    candidates.extend(project_members.iter());

    let mut tokens: Vec<String> = candidates
        .into_iter()
        .filter_map(|user| user.email.as_deref())
        .map(make_email_permission_token)
        .collect();
    tokens.sort();
    tokens.dedup();

    if let Some(invalid) = tokens.iter().find(|token| !is_valid_permission_token(token)) {
        return Err(IngestError::Other(anyhow::anyhow!("invalid permission token: {invalid}")));
    }

    Ok((PermissionPolicy::Private, tokens))
}

/// Split `full_content` into embedding-ready chunks, each prefixed with a
/// `[Part i of N]` marker when the document spans more than one chunk.
pub fn to_embedding_chunks(document_id: DocumentId, full_content: &str) -> Vec<Chunk> {
    if full_content.trim().is_empty() {
        return Vec::new();
    }

    let pieces = split_text(full_content, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP, DEFAULT_SEPARATORS);
    let total = pieces.len() as u32;

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let content = if total == 1 { text } else { format!("[Part {} of {}]\n\n{}", i + 1, total, text) };
            let metadata = serde_json::json!({ "chunk_index": i, "total_chunks": total });
            let content_hash = compute_chunk_content_hash(&content, &metadata);
            Chunk {
                id: deterministic_chunk_id(document_id, &format!("{}", i)),
                document_id,
                index: i as u32,
                total,
                content,
                content_hash,
            }
        })
        .collect()
}

/// Reference id used for cross-source linking, matching
/// `asana_task_reference_id`.
pub fn reference_id(task_gid: &str) -> String {
    format!("r_asana_task_{}", task_gid)
}

fn document_key(task_gid: &str) -> String {
    format!("asana_task_{}", task_gid)
}

/// Build a full task document from a task's content, its activity stories,
/// and the visibility facts needed to derive permissions.
pub fn build_task_document(
    task_content: &AsanaTaskContent,
    stories: &[AsanaStoryContent],
    is_public: bool,
    project_members: &[AsanaUser],
) -> IngestResult<AsanaTaskDocument> {
    let task_gid = task_content.task.gid.clone();
    let id = deterministic_document_id(&document_key(&task_gid));
    let header = header_content(task_content);
    let body = render_body(task_content, stories);
    let chunks = to_embedding_chunks(id, &body);
    let (permission_policy, permission_allowed_tokens) =
        derive_permissions(is_public, task_content, project_members)?;

    let assignee_gid = task_content.task.assignee.as_ref().map(|u| u.gid.clone());
    let assignee_name = task_content.task.assignee.as_ref().map(|u| u.name.clone());
    let project_gids: Vec<String> = task_content
        .task
        .memberships
        .iter()
        .filter_map(|m| m.project.as_ref().map(|p| p.gid.clone()))
        .collect();
    let section_gids: Vec<String> = task_content
        .task
        .memberships
        .iter()
        .filter_map(|m| m.section.as_ref().map(|s| s.gid.clone()))
        .collect();

    let metadata = serde_json::json!({
        "task_gid": task_gid,
        "task_name": task_content.task.name,
        "permalink_url": task_content.task.permalink_url,
        "project_gids": project_gids,
        "section_gids": section_gids,
        "workspace_gid": task_content.workspace.gid,
        "workspace_name": task_content.workspace.name,
        "created_at": task_content.task.created_at,
        "modified_at": task_content.task.modified_at,
        "due_on": task_content.task.due_on,
        "start_on": task_content.task.start_on,
        "assignee_gid": assignee_gid,
        "assignee_name": assignee_name,
    });

    Ok(AsanaTaskDocument {
        id,
        reference_id: reference_id(&task_gid),
        entity: EntityKind::AsanaTask,
        entity_id: task_gid,
        permission_policy,
        permission_allowed_tokens,
        header,
        body,
        chunks,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(gid: &str, name: &str, email: Option<&str>) -> AsanaUser {
        AsanaUser { gid: gid.into(), name: name.into(), email: email.map(String::from) }
    }

    fn minimal_task() -> AsanaTaskContent {
        AsanaTaskContent {
            task: AsanaTaskFields {
                gid: "123".into(),
                name: "Ship the feature".into(),
                permalink_url: "https://app.asana.com/123".into(),
                notes: Some("Do the thing.".into()),
                parent: None,
                memberships: vec![],
                tags: vec![],
                resource_subtype: "default_task".into(),
                approval_status: None,
                due_on: Some("2026-08-01".into()),
                start_on: None,
                completed_at: None,
                num_likes: 2,
                num_subtasks: 0,
                actual_time_minutes: None,
                created_at: "2026-01-01T00:00:00.000Z".into(),
                modified_at: "2026-01-02T00:00:00.000Z".into(),
                assignee: Some(user("a1", "Alice", Some("Alice@Example.com"))),
                followers: vec![user("b2", "Bob", Some("bob@example.com"))],
                created_by: Some(user("a1", "Alice", Some("alice@example.com"))),
                completed_by: None,
                custom_fields: vec![],
            },
            workspace: NamedResource { gid: "w1".into(), name: "Acme".into() },
        }
    }

    #[test]
    fn named_content_formats_gid_and_name() {
        let resource = NamedResource { gid: "9".into(), name: "Launch".into() };
        assert_eq!(named_content(Some(&resource)), "<@Launch|@9>");
        assert_eq!(named_content(None), "");
    }

    #[test]
    fn user_content_prefixes_non_email_names() {
        let plain = user("1", "Alice", Some("a@example.com"));
        assert_eq!(user_content(Some(&plain)), "<@Alice|a@example.com|@1>");

        let email_name = user("2", "bob@example.com", Some("bob@example.com"));
        assert_eq!(user_content(Some(&email_name)), "<bob@example.com|bob@example.com|@2>");
    }

    #[test]
    fn missing_optional_header_fields_render_as_none_literal() {
        let rendered = header_content(&minimal_task());
        assert!(rendered.contains("- Approval Status: None"));
        assert!(rendered.contains("- Due On: 2026-08-01"));
        assert!(rendered.contains("- Start On: None"));
    }

    #[test]
    fn public_task_has_tenant_policy_and_no_tokens() {
        let task = minimal_task();
        let (policy, tokens) = derive_permissions(true, &task, &[]).unwrap();
        assert_eq!(policy, PermissionPolicy::Tenant);
        assert!(tokens.is_empty());
    }

    #[test]
    fn private_task_collects_assignee_and_follower_tokens() {
        let task = minimal_task();
        let (policy, tokens) = derive_permissions(false, &task, &[]).unwrap();
        assert_eq!(policy, PermissionPolicy::Private);
        assert_eq!(tokens, vec!["email:alice@example.com".to_string(), "email:bob@example.com".to_string()]);
    }

    #[test]
    fn invalid_permission_token_aborts_document_construction() {
        let mut task = minimal_task();
        task.task.assignee = Some(user("9", "Bad Email", Some("not-an-email")));
        let err = derive_permissions(false, &task, &[]).unwrap_err();
        assert!(matches!(err, IngestError::Other(_)));
    }

    #[test]
    fn single_chunk_has_no_part_prefix() {
        let id = deterministic_document_id("asana_task_123");
        let chunks = to_embedding_chunks(id, "short body");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "short body");
        assert_eq!(chunks[0].total, 1);
    }

    #[test]
    fn multi_chunk_documents_get_part_markers() {
        let id = deterministic_document_id("asana_task_123");
        let long_body = "word ".repeat(3000);
        let chunks = to_embedding_chunks(id, &long_body);
        assert!(chunks.len() > 1);
        assert!(chunks[0].content.starts_with("[Part 1 of "));
    }

    #[test]
    fn document_id_is_deterministic_per_task_gid() {
        let a = deterministic_document_id(&document_key("123"));
        let b = deterministic_document_id(&document_key("123"));
        let c = deterministic_document_id(&document_key("456"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn story_classification_renders_expected_sentence() {
        let story = AsanaStoryContent {
            gid: "s1".into(),
            story_type: "system".into(),
            resource_subtype: "assigned".into(),
            created_at: "2026-01-03T00:00:00.000Z".into(),
            created_by: Some(user("a1", "Alice", None)),
            text: None,
            num_likes: None,
            assignee: Some(user("b2", "Bob", None)),
            collaborator: None,
            task: None,
            project: None,
            tag: None,
            new_section: None,
            old_dates: None,
            new_dates: None,
        };
        assert_eq!(story_content(&story), "<@Alice||@a1> assigned this task to <@Bob||@b2>.");
    }
}
