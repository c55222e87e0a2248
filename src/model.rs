//! Core data model.
//!
//! A worker is a technician on the shop roster. It has identity, contact
//! details, a work status with its presence flag, and an optional job.
//! Sessions describe who is currently signed in and with which role.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Stable worker identifier, provisioned by the roster source (e.g. "tech-1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The job currently occupying a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentJob {
    pub id: String,
    pub title: String,
}

/// One technician tracked by the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,

    pub display_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub location: Option<String>,

    /// True while the worker is online. Always equal to
    /// `current_status != Offline`.
    pub is_active: bool,

    /// Never moves backwards.
    pub last_seen: DateTime<Utc>,

    pub current_status: WorkStatus,

    /// Present only while `current_status` is `Busy`.
    pub current_job: Option<CurrentJob>,

    /// Capability tags. Informational.
    pub skillset: BTreeSet<String>,

    // Counters owned by job-completion collaborators; read-only here.
    pub completed_jobs_today: u32,
    pub hours_worked_today: f64,
    pub efficiency: u8,

    /// Annotation left by the most recent status change.
    pub notes: Option<String>,
}

impl Worker {
    pub fn is_available(&self) -> bool {
        self.is_active && self.current_status == WorkStatus::Available
    }
}

// ---------------------------------------------------------------------------
// Work status
// ---------------------------------------------------------------------------

/// Work state of a technician.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Available,
    /// Occupied by a job.
    Busy,
    Break,
    /// Rest state. The only status with `is_active == false`.
    Offline,
}

impl WorkStatus {
    /// Whether a worker in this status counts as online.
    pub fn is_online(self) -> bool {
        self != WorkStatus::Offline
    }

    /// Label shown on the presence board.
    pub fn label(self) -> &'static str {
        match self {
            WorkStatus::Available => "Available",
            WorkStatus::Busy => "Working",
            WorkStatus::Break => "On Break",
            WorkStatus::Offline => "Offline",
        }
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkStatus::Available => "available",
            WorkStatus::Busy => "busy",
            WorkStatus::Break => "break",
            WorkStatus::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(WorkStatus::Available),
            "busy" => Ok(WorkStatus::Busy),
            "break" => Ok(WorkStatus::Break),
            "offline" => Ok(WorkStatus::Offline),
            other => Err(format!("unknown work status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Role held by the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Technician,
    OfficeManager,
    Admin,
    Customer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Technician => "technician",
            Role::OfficeManager => "office_manager",
            Role::Admin => "admin",
            Role::Customer => "customer",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "technician" => Ok(Role::Technician),
            "office_manager" | "manager" => Ok(Role::OfficeManager),
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identifies one sign-in. A new login gets a new id even for the same worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// The current session descriptor supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub worker_id: WorkerId,
    pub role: Role,
    pub display_name: String,
}

impl Session {
    pub fn new(worker_id: impl Into<WorkerId>, role: Role) -> Self {
        let worker_id = worker_id.into();
        Self {
            id: SessionId::new(),
            display_name: worker_id.to_string(),
            worker_id,
            role,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn is_technician(&self) -> bool {
        self.role == Role::Technician
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Aggregate counts for a presence board. Derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub total: usize,
    pub online: usize,
    pub busy: usize,
    pub available: usize,
    pub on_break: usize,
    pub offline: usize,
}

impl RosterSummary {
    pub fn from_workers<'a>(workers: impl IntoIterator<Item = &'a Worker>) -> Self {
        let mut summary = Self::default();
        for worker in workers {
            summary.total += 1;
            if worker.is_active {
                summary.online += 1;
            }
            match worker.current_status {
                WorkStatus::Available => summary.available += 1,
                WorkStatus::Busy => summary.busy += 1,
                WorkStatus::Break => summary.on_break += 1,
                WorkStatus::Offline => summary.offline += 1,
            }
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for seeding roster entries. Seeded workers start offline.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWorker {
    pub(crate) id: WorkerId,
    pub(crate) display_name: String,
    pub(crate) contact_email: String,
    #[serde(default)]
    pub(crate) contact_phone: Option<String>,
    #[serde(default)]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) skillset: BTreeSet<String>,
    #[serde(default)]
    pub(crate) last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) completed_jobs_today: u32,
    #[serde(default)]
    pub(crate) hours_worked_today: f64,
    #[serde(default = "default_efficiency")]
    pub(crate) efficiency: u8,
}

fn default_efficiency() -> u8 {
    100
}

impl NewWorker {
    pub fn new(
        id: impl Into<WorkerId>,
        display_name: impl Into<String>,
        contact_email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            contact_email: contact_email.into(),
            contact_phone: None,
            location: None,
            skillset: BTreeSet::new(),
            last_seen: None,
            completed_jobs_today: 0,
            hours_worked_today: 0.0,
            efficiency: default_efficiency(),
        }
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.contact_phone = Some(phone.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn skill(mut self, skill: impl Into<String>) -> Self {
        self.skillset.insert(skill.into());
        self
    }

    pub fn last_seen(mut self, at: DateTime<Utc>) -> Self {
        self.last_seen = Some(at);
        self
    }

    pub fn efficiency(mut self, percent: u8) -> Self {
        self.efficiency = percent;
        self
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Materialize the worker record. `now` is used when no last-seen is given.
    pub(crate) fn build(self, now: DateTime<Utc>) -> Worker {
        Worker {
            id: self.id,
            display_name: self.display_name,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            location: self.location,
            is_active: false,
            last_seen: self.last_seen.unwrap_or(now),
            current_status: WorkStatus::Offline,
            current_job: None,
            skillset: self.skillset,
            completed_jobs_today: self.completed_jobs_today,
            hours_worked_today: self.hours_worked_today,
            efficiency: self.efficiency,
            notes: None,
        }
    }
}
