//! Span-scoped logging context for extractor runs.
//!
//! Entering a [`LogContext`] attaches `tenant_id`/`backfill_id`/`source`
//! fields to every `tracing` event emitted for the lifetime of the guard, so
//! a single backfill run's log lines can be correlated without threading the
//! ids through every call site by hand.

use crate::identity::{BackfillId, TenantId};
use tracing::Span;

/// Builder for a tracing span carrying ingestion run identifiers.
pub struct LogContext {
    span: Span,
}

impl LogContext {
    pub fn new(tenant_id: TenantId, source: &'static str) -> Self {
        let span = tracing::info_span!("ingest_run", %tenant_id, source, backfill_id = tracing::field::Empty);
        Self { span }
    }

    pub fn with_backfill(self, backfill_id: BackfillId) -> Self {
        self.span.record("backfill_id", tracing::field::display(backfill_id));
        self
    }

    /// Enter the span for the duration of the returned guard. Only safe for
    /// code that never awaits while the guard is live — an async job runner
    /// should use [`LogContext::into_span`] with `tracing::Instrument`
    /// instead, since a held `Entered` guard is not `Send` across `.await`
    /// points.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// Consume this context, returning the underlying span for use with
    /// `tracing::Instrument::instrument` around an async job's future.
    pub fn into_span(self) -> Span {
        self.span
    }
}
