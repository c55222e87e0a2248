//! Presence service: session lifecycle around a shared tracker.
//!
//! Starting a technician session spawns a [`driver`] task that owns the
//! heartbeat interval and the idle timers. Ending the session, signing out,
//! disposing the service or simply dropping it cancels that task, so no
//! timer can fire against a session that is gone.

pub mod activity;
mod driver;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::PresenceConfig;
use crate::error::Result;
use crate::model::{Session, SessionId, Worker};
use crate::tracker::PresenceTracker;

pub use activity::{Activity, ActivitySource};
use driver::SessionDriver;

/// Tracker handle shared between the UI, observers and the session driver.
pub type SharedTracker = Arc<RwLock<PresenceTracker>>;

pub struct PresenceService {
    tracker: SharedTracker,
    config: PresenceConfig,
    activity: ActivitySource,
    driver: Option<SessionDriver>,
}

impl PresenceService {
    pub fn new(tracker: PresenceTracker, config: PresenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tracker: Arc::new(RwLock::new(tracker)),
            config,
            activity: ActivitySource::new(),
            driver: None,
        })
    }

    /// Shared handle for mutations and queries.
    pub fn tracker(&self) -> SharedTracker {
        Arc::clone(&self.tracker)
    }

    /// Handle the UI uses to report pointer, key and scroll activity.
    pub fn activity(&self) -> ActivitySource {
        self.activity.clone()
    }

    /// Whether a session driver is currently running.
    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Replace the current session. Technician sessions are marked active
    /// and get heartbeat and idle timers; other roles are observers only.
    pub async fn start_session(&mut self, session: Session) -> SessionId {
        self.stop_driver().await;

        let technician = session.is_technician();
        let worker_id = session.worker_id.clone();

        let mut tracker = self.tracker.write().await;
        let session_id = tracker.begin_session(session);
        if technician {
            let events = tracker.subscribe();
            drop(tracker);
            self.driver = Some(SessionDriver::spawn(
                self.tracker(),
                session_id,
                worker_id,
                self.config,
                self.activity.subscribe(),
                events,
            ));
        }
        session_id
    }

    /// Stop the timers and forget the session. The record keeps its status.
    pub async fn end_session(&mut self) -> Option<Session> {
        self.stop_driver().await;
        self.tracker.write().await.end_session()
    }

    /// Explicit sign-out: mark the technician offline, then end the session.
    pub async fn sign_out(&mut self) -> Option<Session> {
        self.stop_driver().await;
        let mut tracker = self.tracker.write().await;
        tracker.mark_offline();
        let session = tracker.end_session();
        if let Some(ref s) = session {
            info!(worker_id = %s.worker_id, worker_name = %s.display_name, "signed out");
        }
        session
    }

    /// Shut down: stop timers, end the session and return the final roster.
    pub async fn dispose(mut self) -> Vec<Worker> {
        self.stop_driver().await;
        let mut tracker = self.tracker.write().await;
        tracker.end_session();
        tracker.snapshot()
    }

    async fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.stop().await;
        }
    }
}
