//! presence CLI: presence board and live technician sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use presence_tracker::clock::TokioClock;
use presence_tracker::config::Config;
use presence_tracker::model::{Role, Session, WorkStatus, Worker, WorkerId};
use presence_tracker::roster::{Roster, load_seed_file};
use presence_tracker::service::{Activity, PresenceService};
use presence_tracker::telemetry::{TelemetryConfig, init_telemetry};
use presence_tracker::tracker::PresenceTracker;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "presence", about = "Technician presence tracking")]
struct Cli {
    /// Roster seed file (TOML). Falls back to PRESENCE_ROSTER_FILE.
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the presence board for the seeded roster
    Board,
    /// Run a live session for one worker, reading commands from stdin
    Session {
        /// Worker id from the roster (e.g. tech-1)
        worker_id: String,
        /// Role of the signed-in user
        #[arg(long, default_value = "technician")]
        role: String,
        /// Display name for logs and the session-started event
        /// (defaults to the roster name)
        #[arg(long)]
        name: Option<String>,
    },
}

/// One line of session input.
#[derive(Debug, PartialEq)]
enum Input {
    Busy { job_id: String, title: String },
    Clear,
    Status(WorkStatus, Option<String>),
    Heartbeat,
    Board,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match word {
        "busy" => match rest.split_once(' ') {
            Some((job_id, title)) => Input::Busy {
                job_id: job_id.to_string(),
                title: title.trim().to_string(),
            },
            None if !rest.is_empty() => Input::Busy {
                job_id: rest.to_string(),
                title: rest.to_string(),
            },
            None => Input::Unknown(line.to_string()),
        },
        "clear" => Input::Clear,
        "available" | "break" | "offline" => {
            let notes = (!rest.is_empty()).then(|| rest.to_string());
            match word.parse() {
                Ok(status) => Input::Status(status, notes),
                Err(_) => Input::Unknown(line.to_string()),
            }
        }
        "heartbeat" | "" => Input::Heartbeat,
        "board" => Input::Board,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let roster_file = cli
        .roster
        .or_else(|| config.roster_file.clone())
        .context("no roster file: pass --roster or set PRESENCE_ROSTER_FILE")?;

    match cli.command {
        Command::Board => cmd_board(&roster_file),
        Command::Session {
            worker_id,
            role,
            name,
        } => cmd_session(config, &roster_file, worker_id, role, name).await,
    }
}

fn load_roster(path: &Path) -> anyhow::Result<Roster> {
    let seed = load_seed_file(path)?;
    Ok(Roster::init(seed, chrono::Utc::now())?)
}

fn cmd_board(roster_file: &Path) -> anyhow::Result<()> {
    let roster = load_roster(roster_file)?;
    let workers = roster.snapshot();
    print_board(&workers);
    Ok(())
}

fn print_board(workers: &[Worker]) {
    if workers.is_empty() {
        println!("Roster is empty.");
        return;
    }

    println!(
        "{:<10}  {:<20}  {:<9}  {:<7}  {:<24}  LAST SEEN",
        "ID", "NAME", "STATUS", "ONLINE", "JOB"
    );
    println!("{}", "-".repeat(90));

    for worker in workers {
        let job = worker
            .current_job
            .as_ref()
            .map(|j| format!("{} {}", j.id, j.title))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10}  {:<20}  {:<9}  {:<7}  {:<24}  {}",
            worker.id,
            worker.display_name,
            worker.current_status.label(),
            if worker.is_active { "online" } else { "offline" },
            job,
            worker.last_seen.format("%H:%M")
        );
    }

    let summary = presence_tracker::model::RosterSummary::from_workers(workers);
    println!(
        "\n{} worker(s), {} online, {} busy",
        summary.total, summary.online, summary.busy
    );
}

async fn cmd_session(
    config: Config,
    roster_file: &Path,
    worker_id: String,
    role: String,
    name: Option<String>,
) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig::from_config(&config, "presence"))?;

    let role: Role = role.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let roster = load_roster(roster_file)?;
    let worker_id = WorkerId::new(worker_id);
    let roster_name = roster.require(&worker_id)?.display_name.clone();

    let tracker = PresenceTracker::with_clock(roster, Arc::new(TokioClock::new()));
    let mut service = PresenceService::new(tracker, config.presence)?;
    let handle = service.tracker();
    let activity = service.activity();

    // Echo roster events as JSON lines.
    let mut events = handle.read().await.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!("cannot encode event: {e}"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("event printer lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let session = Session::new(worker_id, role).display_name(name.unwrap_or(roster_name));
    service.start_session(session).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = next_line(&mut lines) => match line {
                Some(line) => line,
                None => break,
            },
        };

        // Any input counts as keyboard activity.
        activity.pulse(Activity::Key);

        if !dispatch(&mut *handle.write().await, parse_input(&line)) {
            break;
        }
    }

    service.sign_out().await;
    let workers = service.dispose().await;
    drop(handle);
    printer.abort();
    print_board(&workers);
    Ok(())
}

/// Next input line. End of input and read errors both end the session,
/// so sign-out still runs.
async fn next_line<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("cannot read session input: {e}");
            None
        }
    }
}

/// Apply one command. Returns `false` when the session should end.
fn dispatch(tracker: &mut PresenceTracker, input: Input) -> bool {
    match input {
        Input::Busy { job_id, title } => {
            tracker.set_current_job(job_id, title);
        }
        Input::Clear => {
            tracker.clear_current_job();
        }
        Input::Status(WorkStatus::Offline, _) => {
            tracker.mark_offline();
        }
        Input::Status(WorkStatus::Available, notes)
            if tracker.current_worker().is_some_and(|w| !w.is_active) =>
        {
            tracker.mark_active();
            if notes.is_some() {
                tracker.update_status(WorkStatus::Available, notes);
            }
        }
        Input::Status(status, notes) => {
            tracker.update_status(status, notes);
        }
        Input::Heartbeat => {
            tracker.send_heartbeat();
        }
        Input::Board => print_board(&tracker.snapshot()),
        Input::Quit => return false,
        Input::Unknown(text) => {
            eprintln!(
                "unknown command '{text}' (busy <job> <title> | clear | available | break [notes] | offline | board | quit)"
            );
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use presence_tracker::model::NewWorker;

    use super::*;

    #[test]
    fn parses_busy_with_title() {
        assert_eq!(
            parse_input("busy J-1 Oil change"),
            Input::Busy {
                job_id: "J-1".into(),
                title: "Oil change".into()
            }
        );
    }

    #[test]
    fn parses_break_with_notes() {
        assert_eq!(
            parse_input("break lunch"),
            Input::Status(WorkStatus::Break, Some("lunch".into()))
        );
        assert_eq!(parse_input("offline"), Input::Status(WorkStatus::Offline, None));
    }

    fn signed_in_tracker() -> PresenceTracker {
        let roster = Roster::init(
            [NewWorker::new("tech-1", "Mike Johnson", "mike@company.com")],
            chrono::Utc::now(),
        )
        .unwrap();
        let mut tracker = PresenceTracker::new(roster);
        tracker.begin_session(Session::new("tech-1", Role::Technician));
        tracker
    }

    fn me(tracker: &PresenceTracker) -> Worker {
        tracker.current_worker().cloned().unwrap()
    }

    #[test]
    fn available_with_notes_brings_offline_worker_back_with_notes() {
        let mut tracker = signed_in_tracker();
        assert!(dispatch(&mut tracker, parse_input("offline")));
        assert!(!me(&tracker).is_active);

        assert!(dispatch(&mut tracker, parse_input("available back from parts run")));
        let w = me(&tracker);
        assert!(w.is_active);
        assert_eq!(w.current_status, WorkStatus::Available);
        assert_eq!(w.notes.as_deref(), Some("back from parts run"));
    }

    #[test]
    fn dispatch_drives_job_commands_and_quit() {
        let mut tracker = signed_in_tracker();
        assert!(dispatch(&mut tracker, parse_input("busy J-1 Oil change")));
        assert_eq!(me(&tracker).current_status, WorkStatus::Busy);

        assert!(dispatch(&mut tracker, parse_input("clear")));
        let w = me(&tracker);
        assert_eq!(w.current_status, WorkStatus::Available);
        assert!(w.current_job.is_none());

        assert!(!dispatch(&mut tracker, parse_input("quit")));
    }

    #[tokio::test]
    async fn unreadable_input_ends_the_session() {
        let mut lines = BufReader::new(&b"\xff\xfe\n"[..]).lines();
        assert_eq!(next_line(&mut lines).await, None);

        let mut lines = BufReader::new(&b"busy J-1\n"[..]).lines();
        assert_eq!(next_line(&mut lines).await.as_deref(), Some("busy J-1"));
        assert_eq!(next_line(&mut lines).await, None);
    }

    #[test]
    fn blank_line_is_a_heartbeat() {
        assert_eq!(parse_input("   "), Input::Heartbeat);
        assert!(matches!(parse_input("dance"), Input::Unknown(_)));
        assert_eq!(parse_input("busy"), Input::Unknown("busy".into()));
    }
}
