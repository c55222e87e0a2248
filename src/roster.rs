//! In-memory roster store.
//!
//! Single source of truth for worker records in this process. Keeps
//! insertion order for board rendering and enforces one record per id.
//! All writes go through the tracker.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{NewWorker, RosterSummary, Worker, WorkerId};

/// Top-level TOML wrapper for seed files.
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default, rename = "worker")]
    workers: Vec<NewWorker>,
}

/// Read seed entries from a TOML file of `[[worker]]` tables.
pub fn load_seed_file(path: &Path) -> Result<Vec<NewWorker>> {
    let content = std::fs::read_to_string(path)?;
    parse_seed(&content)
        .map_err(|e| Error::Config(format!("bad roster file {}: {e}", path.display())))
}

/// Parse seed entries from TOML text.
pub fn parse_seed(content: &str) -> std::result::Result<Vec<NewWorker>, toml::de::Error> {
    let seed: SeedFile = toml::from_str(content)?;
    Ok(seed.workers)
}

/// Ordered collection of worker records.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    workers: Vec<Worker>,
    index: HashMap<WorkerId, usize>,
}

impl Roster {
    /// Build the roster from seed entries, in order. Fails on duplicate ids.
    pub fn init(seed: impl IntoIterator<Item = NewWorker>, now: DateTime<Utc>) -> Result<Self> {
        let mut roster = Self::default();
        for new in seed {
            if roster.contains(new.id()) {
                return Err(Error::DuplicateWorker(new.id().clone()));
            }
            let worker = new.build(now);
            roster.index.insert(worker.id.clone(), roster.workers.len());
            roster.workers.push(worker);
        }
        debug!(workers = roster.workers.len(), "roster initialized");
        Ok(roster)
    }

    /// Tear the roster down, handing back the final records.
    pub fn dispose(self) -> Vec<Worker> {
        debug!(workers = self.workers.len(), "roster disposed");
        self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn contains(&self, id: &WorkerId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a worker that must exist, e.g. the one a session is
    /// being opened for.
    pub fn require(&self, id: &WorkerId) -> Result<&Worker> {
        self.get(id).ok_or_else(|| Error::UnknownWorker(id.clone()))
    }

    /// Look up a worker. Absence is a normal outcome.
    pub fn get(&self, id: &WorkerId) -> Option<&Worker> {
        self.index.get(id).map(|&i| &self.workers[i])
    }

    pub(crate) fn get_mut(&mut self, id: &WorkerId) -> Option<&mut Worker> {
        self.index.get(id).map(|&i| &mut self.workers[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.iter()
    }

    /// Owned copy of every record, in seed order.
    pub fn snapshot(&self) -> Vec<Worker> {
        self.workers.clone()
    }

    pub fn active(&self) -> Vec<Worker> {
        self.workers.iter().filter(|w| w.is_active).cloned().collect()
    }

    pub fn available(&self) -> Vec<Worker> {
        self.workers
            .iter()
            .filter(|w| w.is_available())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> RosterSummary {
        RosterSummary::from_workers(&self.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_keeps_seed_order() {
        let roster = Roster::init(
            [
                NewWorker::new("tech-2", "Sarah Wilson", "sarah@company.com"),
                NewWorker::new("tech-1", "Mike Johnson", "mike@company.com"),
            ],
            Utc::now(),
        )
        .unwrap();
        let ids: Vec<_> = roster.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["tech-2", "tech-1"]);
    }

    #[test]
    fn init_rejects_duplicate_ids() {
        let result = Roster::init(
            [
                NewWorker::new("tech-1", "Mike Johnson", "mike@company.com"),
                NewWorker::new("tech-1", "Mike J.", "mike2@company.com"),
            ],
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::DuplicateWorker(id)) if id.as_str() == "tech-1"));
    }

    #[test]
    fn parse_seed_reads_worker_tables() {
        let seed = parse_seed(
            r#"
            [[worker]]
            id = "tech-1"
            display_name = "Mike Johnson"
            contact_email = "mike@company.com"
            contact_phone = "+1234567892"
            skillset = ["Engine Repair", "Oil Changes"]
            efficiency = 95

            [[worker]]
            id = "tech-2"
            display_name = "Sarah Wilson"
            contact_email = "sarah@company.com"
            last_seen = "2026-01-05T08:00:00Z"
            "#,
        )
        .unwrap();

        assert_eq!(seed.len(), 2);
        assert_eq!(seed[0].efficiency, 95);
        assert_eq!(seed[0].skillset.len(), 2);
        assert_eq!(seed[1].efficiency, 100);
        assert!(seed[1].last_seen.is_some());
    }

    #[test]
    fn require_reports_unknown_worker() {
        let roster = Roster::init(
            [NewWorker::new("tech-1", "Mike Johnson", "mike@company.com")],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(roster.require(&WorkerId::from("tech-1")).unwrap().display_name, "Mike Johnson");
        assert!(matches!(
            roster.require(&WorkerId::from("tech-9")),
            Err(Error::UnknownWorker(id)) if id.as_str() == "tech-9"
        ));
    }

    #[test]
    fn empty_seed_is_an_empty_roster() {
        let roster = Roster::init(parse_seed("").unwrap(), Utc::now()).unwrap();
        assert!(roster.is_empty());
        assert_eq!(roster.summary().total, 0);
    }
}
