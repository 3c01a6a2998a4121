//! Pylon artifact construction, grounded on `pylon_artifacts.py`.

use chrono::{DateTime, Utc};
use ingest_core::{Artifact, ArtifactId, EntityIdType, EntityKind, IngestResult, TenantId};

use super::wire::{PylonAccount, PylonContact, PylonIssue, PylonTeam, PylonUser};

pub fn pylon_issue_entity_id(issue_id: &str) -> String {
    format!("pylon_issue_{issue_id}")
}

pub fn pylon_account_entity_id(account_id: &str) -> String {
    format!("pylon_account_{account_id}")
}

pub fn pylon_contact_entity_id(contact_id: &str) -> String {
    format!("pylon_contact_{contact_id}")
}

pub fn pylon_user_entity_id(user_id: &str) -> String {
    format!("pylon_user_{user_id}")
}

pub fn pylon_team_entity_id(team_id: &str) -> String {
    format!("pylon_team_{team_id}")
}

fn parse_iso_or_now(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Issues carry their own `updated_at` (falling back to `created_at`), so
/// they drive a genuine monotonic upsert; everything else below is
/// reference data with no native timestamp and is always force-upserted.
pub fn build_issue_artifact(tenant_id: TenantId, issue: &PylonIssue) -> IngestResult<Artifact> {
    let source_updated_at =
        parse_iso_or_now(issue.updated_at.as_deref().or(issue.created_at.as_deref()));
    let metadata = serde_json::json!({
        "issue_id": issue.id,
        "issue_number": issue.number,
        "state": issue.state,
        "priority": issue.priority,
        "account_id": issue.account.as_ref().map(|a| &a.id),
        "requester_id": issue.requester.as_ref().and_then(|r| r.id.as_ref()),
        "requester_email": issue.requester.as_ref().and_then(|r| r.email.as_ref()),
        "assignee_id": issue.assignee.as_ref().map(|a| &a.id),
        "team_id": issue.team.as_ref().map(|t| &t.id),
        "created_at": issue.created_at,
        "updated_at": issue.updated_at,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::PylonIssue,
        entity_id: pylon_issue_entity_id(&issue.id),
        source_updated_at,
        content: serde_json::to_value(issue).map_err(|e| ingest_core::IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn build_account_artifact(tenant_id: TenantId, account: &PylonAccount) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "account_id": account.id,
        "account_name": account.name,
        "primary_domain": account.primary_domain,
        "created_at": account.created_at,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::PylonAccount,
        entity_id: pylon_account_entity_id(&account.id),
        source_updated_at: now,
        content: serde_json::to_value(account).map_err(|e| ingest_core::IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn build_contact_artifact(tenant_id: TenantId, contact: &PylonContact) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "contact_id": contact.id,
        "contact_name": contact.name,
        "contact_email": contact.email,
        "portal_role": contact.portal_role,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::PylonContact,
        entity_id: pylon_contact_entity_id(&contact.id),
        source_updated_at: now,
        content: serde_json::to_value(contact).map_err(|e| ingest_core::IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn build_user_artifact(tenant_id: TenantId, user: &PylonUser) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "user_id": user.id,
        "user_name": user.name,
        "user_email": user.email,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::PylonUser,
        entity_id: pylon_user_entity_id(&user.id),
        source_updated_at: now,
        content: serde_json::to_value(user).map_err(|e| ingest_core::IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn build_team_artifact(tenant_id: TenantId, team: &PylonTeam) -> IngestResult<Artifact> {
    let metadata = serde_json::json!({
        "team_id": team.id,
        "team_name": team.name,
    });

    let now = Utc::now();
    Ok(Artifact {
        id: ArtifactId::now_v7(),
        tenant_id,
        entity: EntityKind::PylonTeam,
        entity_id: pylon_team_entity_id(&team.id),
        source_updated_at: now,
        content: serde_json::to_value(team).map_err(|e| ingest_core::IngestError::Other(e.into()))?,
        metadata,
        last_seen_backfill_id: None,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_match_the_prefixed_convention() {
        assert_eq!(pylon_issue_entity_id("1"), "pylon_issue_1");
        assert_eq!(pylon_account_entity_id("2"), "pylon_account_2");
        assert_eq!(pylon_contact_entity_id("3"), "pylon_contact_3");
        assert_eq!(pylon_user_entity_id("4"), "pylon_user_4");
        assert_eq!(pylon_team_entity_id("5"), "pylon_team_5");
    }
}
