//! Per-source error variants that a connector needs to distinguish from a
//! plain [`ingest_core::IngestError`], grounded on
//! `asana_api_errors.py`'s three exception classes. These are promoted to
//! `IngestError` at the connector boundary once the caller has had a chance
//! to branch on them (e.g. falling back from sync-token to search-window
//! incremental sync on [`VendorError::InvalidSyncToken`]).

use ingest_core::IngestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VendorError {
    /// The events sync token is missing, expired, or was issued more than
    /// the vendor's retention window ago. Carries the fresh sync token the
    /// vendor returned alongside the 400, when one was provided.
    #[error("sync token invalid or expired")]
    InvalidSyncToken { fresh_sync_token: Option<String> },

    /// The vendor requires a service account to access this resource (e.g.
    /// Asana workspace-level events under an end-user OAuth token).
    #[error("resource requires a service account: {0}")]
    ServiceAccountOnly(String),

    /// The tenant's plan does not include the feature backing this
    /// endpoint (e.g. Asana search is premium-only).
    #[error("payment required: {0}")]
    PaymentRequired(String),

    /// The requested resource does not exist, or the caller lacks access
    /// to it — the vendor API does not distinguish the two cases.
    #[error("not found or forbidden: {0}")]
    NotFoundOrForbidden(String),

    /// Anything else, passed through unchanged.
    #[error(transparent)]
    Other(#[from] IngestError),
}

impl From<VendorError> for IngestError {
    fn from(err: VendorError) -> Self {
        match err {
            VendorError::InvalidSyncToken { .. } => {
                IngestError::InvalidSyncToken { reason: "vendor rejected sync token".into() }
            }
            VendorError::ServiceAccountOnly(_) => IngestError::ServiceAccountOnly,
            VendorError::PaymentRequired(_) => IngestError::PaymentRequired,
            VendorError::NotFoundOrForbidden(entity_id) => {
                IngestError::NotFoundOrForbidden { entity_id }
            }
            VendorError::Other(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sync_token_drops_the_fresh_token_on_conversion() {
        let err = VendorError::InvalidSyncToken { fresh_sync_token: Some("abc".into()) };
        assert!(matches!(IngestError::from(err), IngestError::InvalidSyncToken { .. }));
    }

    #[test]
    fn not_found_or_forbidden_carries_the_entity_id_through() {
        let err = VendorError::NotFoundOrForbidden("task/123".into());
        match IngestError::from(err) {
            IngestError::NotFoundOrForbidden { entity_id } => assert_eq!(entity_id, "task/123"),
            other => panic!("expected NotFoundOrForbidden, got {other:?}"),
        }
    }

    #[test]
    fn other_passes_the_inner_error_through_unchanged() {
        let err = VendorError::Other(IngestError::PaymentRequired);
        assert!(matches!(IngestError::from(err), IngestError::PaymentRequired));
    }
}
