//! Structured events emitted by the tracker on every roster change.
//!
//! Presence boards subscribe to the event stream instead of polling the
//! roster. Ignored mutations are recorded too, so audits can see who tried
//! to change what.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Role, SessionId, WorkStatus, WorkerId};

/// A structured event emitted by the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted {
        session_id: SessionId,
        worker_id: WorkerId,
        role: Role,
        display_name: String,
    },
    SessionEnded {
        session_id: SessionId,
        worker_id: WorkerId,
    },
    StatusChanged {
        worker_id: WorkerId,
        from: WorkStatus,
        to: WorkStatus,
        notes: Option<String>,
    },
    JobAssigned {
        worker_id: WorkerId,
        job_id: String,
        job_title: String,
    },
    JobCleared {
        worker_id: WorkerId,
        job_id: Option<String>,
    },
    Heartbeat {
        worker_id: WorkerId,
        last_seen: DateTime<Utc>,
    },
    MutationRejected {
        operation: String,
        worker_id: Option<WorkerId>,
        reason: String,
    },
}

impl EventKind {
    /// The worker this event is about, if any.
    pub fn worker_id(&self) -> Option<&WorkerId> {
        match self {
            EventKind::SessionStarted { worker_id, .. }
            | EventKind::SessionEnded { worker_id, .. }
            | EventKind::StatusChanged { worker_id, .. }
            | EventKind::JobAssigned { worker_id, .. }
            | EventKind::JobCleared { worker_id, .. }
            | EventKind::Heartbeat { worker_id, .. } => Some(worker_id),
            EventKind::MutationRejected { worker_id, .. } => worker_id.as_ref(),
        }
    }
}
