//! Presence span helpers.
//!
//! Provides span creation and status-transition recording for technician
//! sessions flowing through the tracker.

use tracing::Span;

use crate::model::{SessionId, WorkerId};

/// Start a span covering one technician session.
///
/// The `presence.status` field is declared empty and can be updated via
/// [`record_status_transition`].
pub fn start_session_span(worker_id: &WorkerId, session_id: &SessionId) -> Span {
    tracing::info_span!(
        "presence.session",
        "presence.worker_id" = %worker_id,
        "presence.session_id" = %session_id,
        "presence.status" = tracing::field::Empty,
    )
}

/// Record a status transition on the given span.
///
/// Emits a tracing `info` event scoped to the span and stores the new
/// status in its `presence.status` field.
pub fn record_status_transition(span: &Span, from: &str, to: &str) {
    span.record("presence.status", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "status_transition");
    });
}
