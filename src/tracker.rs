//! Presence tracker. The public API for technician presence.
//!
//! The tracker owns the roster, the current session and the event stream.
//! Every mutation goes through one session guard: only a technician session
//! may change a record, and only its own. Anything else is ignored, never
//! raised, because callers do not check outcomes.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::event::{Event, EventKind};
use crate::model::*;
use crate::roster::Roster;
use crate::telemetry::metrics;

/// Events kept for `events_since` and the broadcast buffer size.
pub const EVENT_HISTORY: usize = 256;

/// Note attached when the idle timer moves a technician to `Break`.
pub const IDLE_BREAK_NOTE: &str = "auto-marked idle";

/// What happened to a mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The caller's record was updated (or already in the requested state).
    Applied,
    /// Nothing changed.
    Ignored(Rejection),
}

impl Mutation {
    pub fn is_applied(self) -> bool {
        matches!(self, Mutation::Applied)
    }
}

/// Why a mutation was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Nobody is signed in.
    NoSession,
    /// The signed-in user is not a technician.
    NotTechnician(Role),
    /// The session's worker is not on the roster.
    UnknownWorker,
    /// `Busy` can only be entered by assigning a job.
    BusyWithoutJob,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::NoSession => "no_session",
            Rejection::NotTechnician(_) => "not_technician",
            Rejection::UnknownWorker => "unknown_worker",
            Rejection::BusyWithoutJob => "busy_without_job",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotTechnician(role) => write!(f, "not_technician ({role})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Where a heartbeat came from. Only used for metrics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSource {
    /// A real user-activity pulse.
    Activity,
    /// The background interval.
    Periodic,
    /// An explicit `send_heartbeat` call.
    Manual,
}

impl HeartbeatSource {
    fn as_str(self) -> &'static str {
        match self {
            HeartbeatSource::Activity => "activity",
            HeartbeatSource::Periodic => "periodic",
            HeartbeatSource::Manual => "manual",
        }
    }
}

/// Owns all presence state and enforces all roster invariants.
pub struct PresenceTracker {
    roster: Roster,
    session: Option<Session>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Event>,
    history: VecDeque<Event>,
    next_seq: u64,
}

impl PresenceTracker {
    /// Create a tracker over an initialized roster, using real time.
    pub fn new(roster: Roster) -> Self {
        Self::with_clock(roster, Arc::new(SystemClock))
    }

    pub fn with_clock(roster: Roster, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_HISTORY);
        Self {
            roster,
            session: None,
            clock,
            events,
            history: VecDeque::with_capacity(EVENT_HISTORY),
            next_seq: 1,
        }
    }

    /// End any session and hand back the final roster records.
    pub fn dispose(mut self) -> Vec<Worker> {
        self.end_session();
        self.roster.dispose()
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Install a new session, replacing any previous one. A technician is
    /// marked active right away.
    pub fn begin_session(&mut self, session: Session) -> SessionId {
        self.end_session();

        let id = session.id;
        info!(
            session_id = %id,
            worker_id = %session.worker_id,
            worker_name = %session.display_name,
            role = %session.role,
            "session started"
        );
        self.record(EventKind::SessionStarted {
            session_id: id,
            worker_id: session.worker_id.clone(),
            role: session.role,
            display_name: session.display_name.clone(),
        });
        let technician = session.is_technician();
        self.session = Some(session);

        if technician {
            self.mark_active();
        }
        id
    }

    /// Drop the current session without touching the roster.
    pub fn end_session(&mut self) -> Option<Session> {
        let session = self.session.take()?;
        info!(
            session_id = %session.id,
            worker_id = %session.worker_id,
            worker_name = %session.display_name,
            "session ended"
        );
        self.record(EventKind::SessionEnded {
            session_id: session.id,
            worker_id: session.worker_id.clone(),
        });
        Some(session)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Is `id` the session currently installed?
    pub fn is_current_session(&self, id: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == id)
    }

    /// The signed-in technician's own record, for self-display.
    pub fn current_worker(&self) -> Option<&Worker> {
        let session = self.session.as_ref().filter(|s| s.is_technician())?;
        self.roster.get(&session.worker_id)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Set the technician's work status. Notes replace the previous ones.
    pub fn update_status(&mut self, status: WorkStatus, notes: Option<String>) -> Mutation {
        self.mutate_own("update_status", |worker, now| {
            if status == WorkStatus::Busy && worker.current_job.is_none() {
                return Err(Rejection::BusyWithoutJob);
            }
            worker.notes = notes.clone();
            let events = apply_status(worker, status, notes);
            stamp(worker, now);
            Ok(events)
        })
    }

    /// Assign a job. The technician becomes `Busy`.
    pub fn set_current_job(
        &mut self,
        job_id: impl Into<String>,
        job_title: impl Into<String>,
    ) -> Mutation {
        let job = CurrentJob {
            id: job_id.into(),
            title: job_title.into(),
        };
        self.mutate_own("set_current_job", move |worker, now| {
            let mut events = vec![EventKind::JobAssigned {
                worker_id: worker.id.clone(),
                job_id: job.id.clone(),
                job_title: job.title.clone(),
            }];
            worker.current_job = Some(job);
            events.extend(apply_status(worker, WorkStatus::Busy, None));
            stamp(worker, now);
            Ok(events)
        })
    }

    /// Drop the current job, whatever the prior status. The technician
    /// becomes `Available`.
    pub fn clear_current_job(&mut self) -> Mutation {
        self.mutate_own("clear_current_job", |worker, now| {
            let events = apply_status(worker, WorkStatus::Available, None);
            stamp(worker, now);
            Ok(events)
        })
    }

    /// Bring the technician online as `Available`.
    pub fn mark_active(&mut self) -> Mutation {
        self.mutate_own("mark_active", |worker, now| {
            let events = apply_status(worker, WorkStatus::Available, None);
            stamp(worker, now);
            Ok(events)
        })
    }

    /// Take the technician offline and clear the job. `last_seen` keeps the
    /// last real activity time.
    pub fn mark_offline(&mut self) -> Mutation {
        self.mutate_own("mark_offline", |worker, _now| {
            Ok(apply_status(worker, WorkStatus::Offline, None))
        })
    }

    /// Refresh `last_seen` only.
    pub fn send_heartbeat(&mut self) -> Mutation {
        self.heartbeat(HeartbeatSource::Manual)
    }

    pub(crate) fn heartbeat(&mut self, source: HeartbeatSource) -> Mutation {
        let outcome = self.mutate_own("send_heartbeat", |worker, now| {
            stamp(worker, now);
            Ok(vec![EventKind::Heartbeat {
                worker_id: worker.id.clone(),
                last_seen: worker.last_seen,
            }])
        });
        if outcome.is_applied() {
            metrics::heartbeats().add(1, &[KeyValue::new("source", source.as_str())]);
        }
        outcome
    }

    /// The single authorization point for every mutation.
    ///
    /// `f` gets the session's own record and the current time, and returns
    /// the events describing what it changed.
    fn mutate_own<F>(&mut self, operation: &'static str, f: F) -> Mutation
    where
        F: FnOnce(&mut Worker, DateTime<Utc>) -> Result<Vec<EventKind>, Rejection>,
    {
        let Some((worker_id, role)) = self
            .session
            .as_ref()
            .map(|s| (s.worker_id.clone(), s.role))
        else {
            return self.reject(operation, None, Rejection::NoSession);
        };
        if role != Role::Technician {
            return self.reject(operation, Some(worker_id), Rejection::NotTechnician(role));
        }

        let now = self.clock.now();
        let Some(worker) = self.roster.get_mut(&worker_id) else {
            return self.reject(operation, Some(worker_id), Rejection::UnknownWorker);
        };

        match f(worker, now) {
            Ok(events) => {
                for kind in events {
                    self.record(kind);
                }
                Mutation::Applied
            }
            Err(rejection) => self.reject(operation, Some(worker_id), rejection),
        }
    }

    fn reject(
        &mut self,
        operation: &'static str,
        worker_id: Option<WorkerId>,
        rejection: Rejection,
    ) -> Mutation {
        debug!(
            operation,
            worker_id = worker_id.as_ref().map(|id| id.as_str()),
            reason = %rejection,
            "mutation ignored"
        );
        metrics::mutations_rejected().add(
            1,
            &[
                KeyValue::new("operation", operation),
                KeyValue::new("reason", rejection.as_str()),
            ],
        );
        self.record(EventKind::MutationRejected {
            operation: operation.to_string(),
            worker_id,
            reason: rejection.to_string(),
        });
        Mutation::Ignored(rejection)
    }

    fn record(&mut self, kind: EventKind) {
        if let EventKind::StatusChanged { worker_id, from, to, .. } = &kind {
            let name = self.roster.get(worker_id).map(|w| w.display_name.as_str());
            info!(worker_id = %worker_id, worker_name = name, from = %from, to = %to, "status changed");
            metrics::status_transitions().add(
                1,
                &[
                    KeyValue::new("from", from.to_string()),
                    KeyValue::new("to", to.to_string()),
                ],
            );
        }

        let event = Event {
            seq: self.next_seq,
            timestamp: self.clock.now(),
            kind,
        };
        self.next_seq += 1;

        if self.history.len() == EVENT_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Every record in seed order.
    pub fn snapshot(&self) -> Vec<Worker> {
        self.roster.snapshot()
    }

    pub fn worker(&self, id: &WorkerId) -> Option<&Worker> {
        self.roster.get(id)
    }

    pub fn active_workers(&self) -> Vec<Worker> {
        self.roster.active()
    }

    pub fn available_workers(&self) -> Vec<Worker> {
        self.roster.available()
    }

    pub fn summary(&self) -> RosterSummary {
        self.roster.summary()
    }

    /// Subscribe to roster changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Retained events with `seq > since`.
    pub fn events_since(&self, since: u64) -> Vec<Event> {
        self.history
            .iter()
            .filter(|e| e.seq > since)
            .cloned()
            .collect()
    }
}

/// Move a worker to `to`, keeping `is_active` and the job in step.
fn apply_status(worker: &mut Worker, to: WorkStatus, notes: Option<String>) -> Vec<EventKind> {
    let mut events = Vec::new();

    if to != WorkStatus::Busy
        && let Some(job) = worker.current_job.take()
    {
        events.push(EventKind::JobCleared {
            worker_id: worker.id.clone(),
            job_id: Some(job.id),
        });
    }

    let from = worker.current_status;
    worker.current_status = to;
    worker.is_active = to.is_online();

    if from != to || notes.is_some() {
        events.push(EventKind::StatusChanged {
            worker_id: worker.id.clone(),
            from,
            to,
            notes,
        });
    }
    events
}

fn stamp(worker: &mut Worker, now: DateTime<Utc>) {
    if now > worker.last_seen {
        worker.last_seen = now;
    }
}
