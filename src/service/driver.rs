//! Session driver: heartbeat interval and idle detection for one session.
//!
//! One tokio task per technician session. The task wakes on activity, on
//! roster events, on the next idle deadline and on the heartbeat tick. It
//! re-checks that its session is still current before every write and
//! exits as soon as it is not.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info};

use crate::config::PresenceConfig;
use crate::event::Event;
use crate::idle::{IdleAction, IdleTimers};
use crate::model::{SessionId, WorkStatus, WorkerId};
use crate::telemetry::metrics;
use crate::telemetry::presence::{record_status_transition, start_session_span};
use crate::tracker::{HeartbeatSource, IDLE_BREAK_NOTE, Mutation, PresenceTracker};

use super::SharedTracker;
use super::activity::Activity;

/// Sleep target used when no idle deadline is pending. The branch is
/// disabled in that case, but `select!` still builds the future.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Handle to a running driver task. Dropping it aborts the task.
pub(crate) struct SessionDriver {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl SessionDriver {
    pub(crate) fn spawn(
        tracker: SharedTracker,
        session_id: SessionId,
        worker_id: WorkerId,
        config: PresenceConfig,
        activity: broadcast::Receiver<Activity>,
        events: broadcast::Receiver<Event>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let span = start_session_span(&worker_id, &session_id);
        let task = DriverLoop {
            tracker,
            session_id,
            worker_id,
            config,
            shutdown: Arc::clone(&shutdown),
            span: span.clone(),
        };
        let handle = tokio::spawn(task.run(activity, events).instrument(span));
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signal the task and wait for it to finish.
    pub(crate) async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.notify_one();
            let _ = handle.await;
        }
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct DriverLoop {
    tracker: SharedTracker,
    session_id: SessionId,
    worker_id: WorkerId,
    config: PresenceConfig,
    shutdown: Arc<Notify>,
    span: tracing::Span,
}

impl DriverLoop {
    async fn run(
        self,
        mut activity: broadcast::Receiver<Activity>,
        mut events: broadcast::Receiver<Event>,
    ) {
        let interval = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + interval, interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut timers = IdleTimers::new(
            self.config.idle_break_threshold,
            self.config.idle_offline_threshold,
        );
        let mut active = false;

        debug!("session driver started");

        loop {
            // Idle timers run only while the record is online. Coming back
            // online starts them afresh.
            let Some(online) = self.observe().await else {
                break;
            };
            if online && !active {
                timers.arm(Instant::now());
            } else if !online {
                timers.disarm();
            }
            active = online;

            let deadline = timers.next_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE);

            tokio::select! {
                biased;

                _ = self.shutdown.notified() => break,

                event = events.recv() => match event {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                pulse = activity.recv() => {
                    let kind = match pulse {
                        Ok(kind) => Some(kind),
                        Err(broadcast::error::RecvError::Lagged(_)) => None,
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    if !active {
                        continue;
                    }
                    debug!(?kind, "activity");
                    if self.act(|t| t.heartbeat(HeartbeatSource::Activity)).await.is_none() {
                        break;
                    }
                    timers.arm(Instant::now());
                }

                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    let Some(action) = timers.poll(Instant::now()) else {
                        continue;
                    };
                    if self.idle(action).await.is_none() {
                        break;
                    }
                }

                _ = heartbeat.tick(), if active => {
                    if self.act(|t| t.heartbeat(HeartbeatSource::Periodic)).await.is_none() {
                        break;
                    }
                }
            }
        }

        debug!("session driver stopped");
    }

    /// Whether the session's record is online, or `None` once the session
    /// is no longer current.
    async fn observe(&self) -> Option<bool> {
        let tracker = self.tracker.read().await;
        if !tracker.is_current_session(self.session_id) {
            return None;
        }
        Some(tracker.worker(&self.worker_id).is_some_and(|w| w.is_active))
    }

    /// Run `f` against the tracker if this session is still current.
    async fn act<R>(&self, f: impl FnOnce(&mut PresenceTracker) -> R) -> Option<R> {
        let mut tracker = self.tracker.write().await;
        if !tracker.is_current_session(self.session_id) {
            debug!("stale session driver, skipping");
            return None;
        }
        Some(f(&mut *tracker))
    }

    async fn idle(&self, action: IdleAction) -> Option<Mutation> {
        let to = match action {
            IdleAction::Break => WorkStatus::Break,
            IdleAction::Offline => WorkStatus::Offline,
        };
        let (from, outcome) = self
            .act(|t| {
                let from = t.worker(&self.worker_id).map(|w| w.current_status);
                let outcome = match action {
                    IdleAction::Break => {
                        t.update_status(WorkStatus::Break, Some(IDLE_BREAK_NOTE.to_string()))
                    }
                    IdleAction::Offline => t.mark_offline(),
                };
                (from, outcome)
            })
            .await?;

        if outcome.is_applied() {
            info!(worker_id = %self.worker_id, to = %to, "idle timeout");
            metrics::idle_transitions().add(1, &[KeyValue::new("to", to.to_string())]);
            if let Some(from) = from {
                record_status_transition(&self.span, &from.to_string(), &to.to_string());
            }
        }
        Some(outcome)
    }
}
