//! Metric instrument factories for presence-tracker.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the [`super::SCOPE`] meter.
//! Without a provider they are no-ops.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for presence-tracker instruments.
fn meter() -> Meter {
    opentelemetry::global::meter(super::SCOPE)
}

/// Counter: work status transitions.
/// Labels: `from`, `to`.
pub fn status_transitions() -> Counter<u64> {
    meter()
        .u64_counter("presence.status.transitions")
        .with_description("Number of technician work status transitions")
        .build()
}

/// Counter: heartbeats applied to a worker record.
/// Labels: `source` ("activity" | "periodic" | "manual").
pub fn heartbeats() -> Counter<u64> {
    meter()
        .u64_counter("presence.heartbeats")
        .with_description("Number of presence heartbeats")
        .build()
}

/// Counter: mutations ignored by the session guard.
/// Labels: `operation`, `reason`.
pub fn mutations_rejected() -> Counter<u64> {
    meter()
        .u64_counter("presence.mutations.rejected")
        .with_description("Mutations ignored because the caller was not the active technician")
        .build()
}

/// Counter: automatic idle transitions.
/// Labels: `to` ("break" | "offline").
pub fn idle_transitions() -> Counter<u64> {
    meter()
        .u64_counter("presence.idle.transitions")
        .with_description("Status changes triggered by idle timeouts")
        .build()
}
