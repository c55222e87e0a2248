//! Idle deadline bookkeeping.
//!
//! Pure state: no tasks, no sleeping. The session driver arms the timers on
//! activity, asks for the next deadline to sleep until, and polls for what
//! is due when it wakes.

use std::time::Duration;

use tokio::time::Instant;

/// Automatic transition that has come due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// No activity for the break threshold.
    Break,
    /// No activity for the offline threshold.
    Offline,
}

/// The two idle deadlines for one technician.
#[derive(Debug, Clone)]
pub struct IdleTimers {
    break_after: Duration,
    offline_after: Duration,
    break_at: Option<Instant>,
    offline_at: Option<Instant>,
}

impl IdleTimers {
    pub fn new(break_after: Duration, offline_after: Duration) -> Self {
        Self {
            break_after,
            offline_after,
            break_at: None,
            offline_at: None,
        }
    }

    /// Cancel and reschedule both deadlines from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.break_at = Some(now + self.break_after);
        self.offline_at = Some(now + self.offline_after);
    }

    /// Cancel both deadlines.
    pub fn disarm(&mut self) {
        self.break_at = None;
        self.offline_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.break_at.is_some() || self.offline_at.is_some()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.break_at, self.offline_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Take the action that is due at `now`, if any. Each deadline fires
    /// once; `Offline` also cancels a pending `Break`.
    pub fn poll(&mut self, now: Instant) -> Option<IdleAction> {
        if self.offline_at.is_some_and(|at| at <= now) {
            self.disarm();
            return Some(IdleAction::Offline);
        }
        if self.break_at.is_some_and(|at| at <= now) {
            self.break_at = None;
            return Some(IdleAction::Break);
        }
        None
    }
}
