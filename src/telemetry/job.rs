//! Job processing span helpers.
//!
//! For workers that want each delivered job's processing traced as a unit.

use std::fmt::Debug;
use tracing::Span;

/// Start a span for processing one delivered job.
///
/// The `job.outcome` field is declared empty and can be filled in via
/// [`record_outcome`].
pub fn start_job_span(worker: &str, job_id: &dyn Debug) -> Span {
    tracing::info_span!(
        "job.process",
        "job.worker" = worker,
        "job.id" = ?job_id,
        "job.outcome" = tracing::field::Empty,
    )
}

/// Record how processing ended on the job's span.
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("job.outcome", outcome);
    span.in_scope(|| {
        tracing::debug!(outcome, "job processed");
    });
}
