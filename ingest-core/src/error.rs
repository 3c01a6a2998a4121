//! Error taxonomy for the ingestion pipeline.

use std::time::Duration;
use thiserror::Error;

/// Errors a source client call can surface. These are intentionally coarse:
/// every vendor-specific failure mode collapses into one of these so a single
/// retry policy can handle all of them uniformly.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The source rejected the request due to rate limiting (HTTP 429), a
    /// 5xx response, or a connect/read timeout. `retry_after` is `Some` when
    /// the source supplied a `Retry-After` header.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// A stored sync token/cursor was rejected by the source as expired or
    /// malformed. Callers should fall back to a window-bounded resync.
    #[error("sync token invalid: {reason}")]
    InvalidSyncToken { reason: String },

    /// The source account is delinquent or unpaid; further calls will not
    /// succeed until billing is resolved upstream.
    #[error("source account payment required")]
    PaymentRequired,

    /// The source requires a service-account-only API method that the
    /// current credential cannot use; caller should step down to a reduced
    /// capability path rather than fail the whole run.
    #[error("operation requires a service account")]
    ServiceAccountOnly,

    /// The source returned 404 or 403 for a specific entity. Distinct from a
    /// hard failure: callers typically treat this as "entity is gone" and
    /// continue the batch.
    #[error("entity not found or forbidden: {entity_id}")]
    NotFoundOrForbidden { entity_id: String },

    /// The tenant has exceeded its billing-derived usage quota for the
    /// current period.
    #[error("usage quota exceeded for tenant {tenant_id} metric {metric}")]
    UsageQuotaExceeded { tenant_id: String, metric: String },

    /// Any other failure. Tasks that surface this variant should fail and
    /// let the work queue redeliver the message.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    /// Whether this error should be retried by a generic retry wrapper
    /// rather than propagated to the caller as a hard failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::RateLimited { .. })
    }
}
