//! Integration tests for the presence tracker.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use presence_tracker::clock::{Clock, ManualClock};
use presence_tracker::event::EventKind;
use presence_tracker::model::*;
use presence_tracker::roster::Roster;
use presence_tracker::tracker::{Mutation, PresenceTracker, Rejection};

fn seed() -> Vec<NewWorker> {
    vec![
        NewWorker::new("tech-1", "Mike Johnson", "mike@company.com")
            .phone("+1234567892")
            .skill("Oil Changes")
            .efficiency(95),
        NewWorker::new("tech-2", "Sarah Wilson", "sarah@company.com").efficiency(88),
        NewWorker::new("tech-3", "Tom Brown", "tom@company.com").efficiency(92),
    ]
}

fn test_tracker() -> (PresenceTracker, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());
    let roster = Roster::init(seed(), clock.now()).unwrap();
    (PresenceTracker::with_clock(roster, Arc::new(clock.clone())), clock)
}

fn w1() -> WorkerId {
    WorkerId::from("tech-1")
}

fn tech_session() -> Session {
    Session::new("tech-1", Role::Technician).display_name("Mike Johnson")
}

fn assert_invariants(tracker: &PresenceTracker) {
    for worker in tracker.snapshot() {
        assert_eq!(
            worker.current_status == WorkStatus::Offline,
            !worker.is_active,
            "offline <=> inactive for {}",
            worker.id
        );
        if worker.current_job.is_some() {
            assert_eq!(worker.current_status, WorkStatus::Busy);
        }
    }
}

// ---------------------------------------------------------------------------
// Session start
// ---------------------------------------------------------------------------

#[test]
fn seeded_roster_is_offline() {
    let (tracker, _) = test_tracker();
    let summary = tracker.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.online, 0);
    assert_eq!(summary.offline, 3);
    assert!(tracker.active_workers().is_empty());
}

#[test]
fn technician_session_marks_worker_active() {
    let (mut tracker, _) = test_tracker();
    tracker.begin_session(tech_session());

    let worker = tracker.worker(&w1()).unwrap();
    assert!(worker.is_active);
    assert_eq!(worker.current_status, WorkStatus::Available);
    assert_eq!(tracker.current_worker().map(|w| &w.id), Some(&w1()));
    assert_eq!(tracker.available_workers().len(), 1);
}

#[test]
fn manager_session_does_not_touch_roster() {
    let (mut tracker, _) = test_tracker();
    let before = tracker.snapshot();

    tracker.begin_session(Session::new("tech-1", Role::OfficeManager));
    assert!(tracker.current_worker().is_none());

    assert_eq!(
        tracker.update_status(WorkStatus::Break, Some("lunch".into())),
        Mutation::Ignored(Rejection::NotTechnician(Role::OfficeManager))
    );
    tracker.set_current_job("J-1", "Oil change");
    tracker.clear_current_job();
    tracker.mark_active();
    tracker.mark_offline();
    tracker.send_heartbeat();

    assert_eq!(tracker.snapshot(), before);
}

#[test]
fn mutations_without_session_are_ignored() {
    let (mut tracker, _) = test_tracker();
    let before = tracker.snapshot();

    assert_eq!(tracker.mark_active(), Mutation::Ignored(Rejection::NoSession));
    assert_eq!(tracker.send_heartbeat(), Mutation::Ignored(Rejection::NoSession));
    assert_eq!(tracker.snapshot(), before);

    let rejected = tracker
        .events_since(0)
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::MutationRejected { .. }))
        .count();
    assert_eq!(rejected, 2);
}

#[test]
fn unknown_worker_session_is_ignored() {
    let (mut tracker, _) = test_tracker();
    let before = tracker.snapshot();

    tracker.begin_session(Session::new("tech-99", Role::Technician));
    assert_eq!(
        tracker.send_heartbeat(),
        Mutation::Ignored(Rejection::UnknownWorker)
    );
    assert_eq!(tracker.snapshot(), before);
    assert!(tracker.worker(&WorkerId::from("tech-99")).is_none());
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[test]
fn job_assignment_scenario() {
    let (mut tracker, _) = test_tracker();
    tracker.begin_session(tech_session());

    assert!(tracker.set_current_job("J-1", "Oil change").is_applied());
    let worker = tracker.worker(&w1()).unwrap();
    assert_eq!(worker.current_status, WorkStatus::Busy);
    assert_eq!(worker.current_job.as_ref().map(|j| j.id.as_str()), Some("J-1"));
    assert_eq!(tracker.summary().busy, 1);

    assert!(tracker.clear_current_job().is_applied());
    let worker = tracker.worker(&w1()).unwrap();
    assert_eq!(worker.current_status, WorkStatus::Available);
    assert!(worker.current_job.is_none());
}

#[test]
fn clear_job_yields_available_from_any_status() {
    for prior in [
        WorkStatus::Available,
        WorkStatus::Break,
        WorkStatus::Offline,
    ] {
        let (mut tracker, _) = test_tracker();
        tracker.begin_session(tech_session());
        tracker.update_status(prior, None);

        tracker.clear_current_job();
        let worker = tracker.worker(&w1()).unwrap();
        assert_eq!(worker.current_status, WorkStatus::Available, "from {prior}");
        assert!(worker.current_job.is_none());
        assert_invariants(&tracker);
    }
}

#[test]
fn busy_requires_a_job() {
    let (mut tracker, _) = test_tracker();
    tracker.begin_session(tech_session());

    assert_eq!(
        tracker.update_status(WorkStatus::Busy, None),
        Mutation::Ignored(Rejection::BusyWithoutJob)
    );
    assert_eq!(
        tracker.worker(&w1()).unwrap().current_status,
        WorkStatus::Available
    );

    tracker.set_current_job("J-2", "Brake pads");
    assert!(tracker.update_status(WorkStatus::Busy, Some("on it".into())).is_applied());
}

#[test]
fn leaving_busy_drops_the_job() {
    let (mut tracker, _) = test_tracker();
    tracker.begin_session(tech_session());
    tracker.set_current_job("J-3", "Tire rotation");

    tracker.update_status(WorkStatus::Break, Some("coffee".into()));
    let worker = tracker.worker(&w1()).unwrap();
    assert_eq!(worker.current_status, WorkStatus::Break);
    assert!(worker.current_job.is_none());
    assert_eq!(worker.notes.as_deref(), Some("coffee"));
    assert!(worker.is_active);
}

// ---------------------------------------------------------------------------
// Offline and heartbeat
// ---------------------------------------------------------------------------

#[test]
fn mark_offline_clears_job_and_keeps_last_seen() {
    let (mut tracker, clock) = test_tracker();
    tracker.begin_session(tech_session());
    tracker.set_current_job("J-1", "Oil change");
    let seen = tracker.worker(&w1()).unwrap().last_seen;

    clock.advance(Duration::from_secs(600));
    tracker.mark_offline();

    let worker = tracker.worker(&w1()).unwrap();
    assert_eq!(worker.current_status, WorkStatus::Offline);
    assert!(!worker.is_active);
    assert!(worker.current_job.is_none());
    assert_eq!(worker.last_seen, seen);
}

#[test]
fn mark_offline_is_idempotent() {
    let (mut tracker, _) = test_tracker();
    tracker.begin_session(tech_session());
    tracker.set_current_job("J-1", "Oil change");

    tracker.mark_offline();
    let once = tracker.snapshot();
    let seq = tracker.events_since(0).last().map(|e| e.seq).unwrap();

    tracker.mark_offline();
    assert_eq!(tracker.snapshot(), once);
    assert!(tracker.events_since(seq).is_empty());
}

#[test]
fn heartbeat_only_moves_last_seen() {
    let (mut tracker, clock) = test_tracker();
    tracker.begin_session(tech_session());
    tracker.set_current_job("J-1", "Oil change");
    let before = tracker.worker(&w1()).unwrap().clone();

    let mut last = before.last_seen;
    for _ in 0..5 {
        clock.advance(Duration::from_secs(30));
        tracker.send_heartbeat();
        let worker = tracker.worker(&w1()).unwrap();
        assert!(worker.last_seen > last);
        last = worker.last_seen;
        assert_eq!(worker.current_status, before.current_status);
        assert_eq!(worker.is_active, before.is_active);
        assert_eq!(worker.current_job, before.current_job);
    }
}

#[test]
fn last_seen_never_moves_backwards() {
    let (mut tracker, clock) = test_tracker();
    tracker.begin_session(tech_session());
    clock.advance(Duration::from_secs(3600));
    tracker.send_heartbeat();
    let seen = tracker.worker(&w1()).unwrap().last_seen;

    // Clock skew backwards
    clock.set(seen - chrono::Duration::minutes(10));
    tracker.send_heartbeat();
    tracker.update_status(WorkStatus::Break, None);
    assert_eq!(tracker.worker(&w1()).unwrap().last_seen, seen);
}

#[test]
fn relogin_after_offline_is_available() {
    let (mut tracker, _) = test_tracker();
    let first = tracker.begin_session(tech_session());
    tracker.mark_offline();
    tracker.end_session();

    let second = tracker.begin_session(tech_session());
    assert_ne!(first, second);
    assert!(!tracker.is_current_session(first));
    let worker = tracker.worker(&w1()).unwrap();
    assert_eq!(worker.current_status, WorkStatus::Available);
    assert!(worker.is_active);
}

// ---------------------------------------------------------------------------
// Invariants over operation sequences
// ---------------------------------------------------------------------------

#[test]
fn invariants_hold_after_every_operation() {
    let (mut tracker, clock) = test_tracker();
    tracker.begin_session(tech_session());

    let steps: Vec<Box<dyn Fn(&mut PresenceTracker)>> = vec![
        Box::new(|t| {
            t.set_current_job("J-1", "Oil change");
        }),
        Box::new(|t| {
            t.update_status(WorkStatus::Break, None);
        }),
        Box::new(|t| {
            t.update_status(WorkStatus::Busy, None);
        }),
        Box::new(|t| {
            t.mark_offline();
        }),
        Box::new(|t| {
            t.set_current_job("J-2", "Alignment");
        }),
        Box::new(|t| {
            t.send_heartbeat();
        }),
        Box::new(|t| {
            t.update_status(WorkStatus::Offline, Some("done for today".into()));
        }),
        Box::new(|t| {
            t.clear_current_job();
        }),
        Box::new(|t| {
            t.mark_active();
        }),
    ];

    // Walk several interleavings of the same operations.
    for round in 0..steps.len() {
        for i in 0..steps.len() {
            let step = &steps[(i * (round + 1) + round) % steps.len()];
            clock.advance(Duration::from_secs(7));
            let before = tracker.worker(&w1()).unwrap().last_seen;
            step(&mut tracker);
            assert_invariants(&tracker);
            assert!(tracker.worker(&w1()).unwrap().last_seen >= before);
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn session_name_defaults_to_worker_id() {
    let (mut tracker, _) = test_tracker();
    let mut rx = tracker.subscribe();

    tracker.begin_session(Session::new("tech-2", Role::Technician));

    let started = rx.try_recv().unwrap();
    assert!(matches!(
        started.kind,
        EventKind::SessionStarted { display_name, .. } if display_name == "tech-2"
    ));
}

#[test]
fn events_describe_status_changes_in_order() {
    let (mut tracker, _) = test_tracker();
    let mut rx = tracker.subscribe();

    tracker.begin_session(tech_session());
    tracker.set_current_job("J-1", "Oil change");

    let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e| e.kind)
        .collect();

    assert!(matches!(
        &kinds[0],
        EventKind::SessionStarted { role: Role::Technician, display_name, .. }
            if display_name == "Mike Johnson"
    ));
    assert_eq!(
        kinds[1],
        EventKind::StatusChanged {
            worker_id: w1(),
            from: WorkStatus::Offline,
            to: WorkStatus::Available,
            notes: None,
        }
    );
    assert!(matches!(&kinds[2], EventKind::JobAssigned { job_id, .. } if job_id == "J-1"));
    assert!(matches!(
        kinds[3],
        EventKind::StatusChanged { to: WorkStatus::Busy, .. }
    ));

    let seqs: Vec<u64> = tracker.events_since(0).iter().map(|e| e.seq).collect();
    assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
}

#[test]
fn dispose_returns_final_records() {
    let (mut tracker, _) = test_tracker();
    tracker.begin_session(tech_session());
    tracker.set_current_job("J-9", "Battery swap");

    let workers = tracker.dispose();
    assert_eq!(workers.len(), 3);
    assert_eq!(workers[0].current_status, WorkStatus::Busy);
    assert_eq!(workers[1].id.as_str(), "tech-2");
}
