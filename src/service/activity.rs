//! User-activity pulses from the host UI.
//!
//! The tracker only cares that something happened, not what. The kind is
//! kept for logs.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered pulses per subscriber. Overflow is still treated as activity.
const ACTIVITY_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Pointer,
    Key,
    Scroll,
}

/// Cloneable handle the UI uses to report activity.
#[derive(Debug, Clone)]
pub struct ActivitySource {
    tx: broadcast::Sender<Activity>,
}

impl ActivitySource {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ACTIVITY_BUFFER);
        Self { tx }
    }

    /// Report one activity signal. Nobody listening is fine.
    pub fn pulse(&self, kind: Activity) {
        let _ = self.tx.send(kind);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Activity> {
        self.tx.subscribe()
    }
}

impl Default for ActivitySource {
    fn default() -> Self {
        Self::new()
    }
}
