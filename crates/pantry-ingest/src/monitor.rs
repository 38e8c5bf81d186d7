//! Read-only progress monitor
//!
//! Polls the checkpoint file and renders what it finds. The monitor never
//! writes the checkpoint and never stops because of bad data: a missing file
//! means no run is active, and an unreadable one is reported and retried on
//! the next tick.

use crate::progress::{create_progress_bar, format_eta, format_percent, format_rate};
use chrono::{DateTime, Utc};
use colored::Colorize;
use indicatif::ProgressBar;
use pantry_common::checkpoint::CheckpointStore;
use pantry_common::types::{IngestionCheckpoint, RunStatus};
use std::fmt::Write as _;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Errors shown per tick
pub const RECENT_ERRORS_SHOWN: usize = 5;

/// Default polling interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Point-in-time view of a run, derived from its checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub data_type: String,
    pub data_type_index: usize,
    pub data_type_count: usize,
    pub page: u32,
    pub processed: u64,
    pub total: u64,
    pub ratio: Option<f64>,
    pub throughput: Option<f64>,
    pub eta: Option<DateTime<Utc>>,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub last_update: DateTime<Utc>,
    pub recent_errors: Vec<String>,
}

impl ProgressSnapshot {
    pub fn from_checkpoint(checkpoint: &IngestionCheckpoint, now: DateTime<Utc>) -> Self {
        // A finished run has no meaningful ETA; a live one is re-projected from now
        let eta = match checkpoint.status {
            RunStatus::Running => checkpoint.estimate_completion(now),
            _ => None,
        };
        Self {
            run_id: checkpoint.run_id,
            status: checkpoint.status,
            data_type: checkpoint.current_data_type.clone(),
            data_type_index: checkpoint.current_data_type_index,
            data_type_count: checkpoint.data_types.len(),
            page: checkpoint.current_page,
            processed: checkpoint.processed_items,
            total: checkpoint.total_items,
            ratio: checkpoint.progress_ratio(),
            throughput: checkpoint.throughput(checkpoint.last_update_time),
            eta,
            inserted: checkpoint.successful_inserts,
            duplicates: checkpoint.skipped_duplicates,
            failed: checkpoint.failed_records,
            last_update: checkpoint.last_update_time,
            recent_errors: checkpoint.recent_errors(RECENT_ERRORS_SHOWN).to_vec(),
        }
    }
}

/// What one poll of the checkpoint file found
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorReport {
    NoActiveRun,
    ReadError(String),
    Progress(ProgressSnapshot),
}

/// Read the checkpoint once
pub fn poll_once(store: &CheckpointStore, now: DateTime<Utc>) -> MonitorReport {
    match store.load() {
        Ok(None) => MonitorReport::NoActiveRun,
        Ok(Some(checkpoint)) => {
            MonitorReport::Progress(ProgressSnapshot::from_checkpoint(&checkpoint, now))
        },
        Err(e) => MonitorReport::ReadError(e.to_string()),
    }
}

fn status_label(status: RunStatus) -> String {
    match status {
        RunStatus::Running => status.as_str().green().to_string(),
        RunStatus::Completed => status.as_str().cyan().to_string(),
        RunStatus::Interrupted => status.as_str().yellow().to_string(),
        RunStatus::Aborted => status.as_str().red().to_string(),
    }
}

/// Plain-text rendering of a report
pub fn render_report(report: &MonitorReport, store: &CheckpointStore, now: DateTime<Utc>) -> String {
    match report {
        MonitorReport::NoActiveRun => {
            format!("No active run (no checkpoint at {})", store.path().display())
        },
        MonitorReport::ReadError(e) => {
            format!("{} {} (retrying next tick)", "Checkpoint read error:".red(), e)
        },
        MonitorReport::Progress(snapshot) => render_snapshot(snapshot, now),
    }
}

fn render_snapshot(s: &ProgressSnapshot, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {} ({})", s.run_id, status_label(s.status));
    let _ = writeln!(
        out,
        "Data type: {} ({}/{}), last page {}",
        s.data_type,
        (s.data_type_index + 1).min(s.data_type_count.max(1)),
        s.data_type_count,
        s.page
    );
    let _ = writeln!(out, "Progress: {}/{} ({})", s.processed, s.total, format_percent(s.ratio));
    let _ = writeln!(
        out,
        "Written: {} inserted, {} duplicates skipped, {} failed",
        s.inserted, s.duplicates, s.failed
    );
    let _ = writeln!(out, "Throughput: {}", format_rate(s.throughput));
    let _ = writeln!(out, "ETA: {}", format_eta(s.eta, now));
    let _ = write!(out, "Last update: {}", s.last_update.format("%Y-%m-%d %H:%M:%S UTC"));

    if !s.recent_errors.is_empty() {
        let _ = write!(out, "\n{}", "Recent errors:".yellow());
        for error in &s.recent_errors {
            let _ = write!(out, "\n  - {}", error);
        }
    }
    out
}

fn update_bar(bar: &ProgressBar, report: &MonitorReport) {
    match report {
        MonitorReport::Progress(s) => {
            bar.set_length(s.total.max(s.processed));
            bar.set_position(s.processed);
            bar.set_message(format!(
                "{} page {} [{}] {} | ETA {}",
                s.data_type,
                s.page,
                status_label(s.status),
                format_rate(s.throughput),
                s.eta
                    .map(|eta| eta.format("%H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ));
        },
        MonitorReport::NoActiveRun => bar.set_message("No active run"),
        MonitorReport::ReadError(e) => bar.set_message(format!("Checkpoint read error: {}", e)),
    }
}

/// Poll every `interval` until cancelled, or once when `once` is set
pub async fn run(store: CheckpointStore, interval: Duration, once: bool, cancel: CancellationToken) {
    if once {
        let report = poll_once(&store, Utc::now());
        println!("{}", render_report(&report, &store, Utc::now()));
        return;
    }

    let bar = create_progress_bar(0, "Waiting for checkpoint");
    let mut last_errors: Vec<String> = Vec::new();

    loop {
        let now = Utc::now();
        let report = poll_once(&store, now);
        debug!(report = ?report, "Monitor tick");

        if bar.is_hidden() {
            println!("{}\n", render_report(&report, &store, now));
        } else {
            update_bar(&bar, &report);
            if let MonitorReport::Progress(s) = &report {
                for error in s.recent_errors.iter().filter(|e| !last_errors.contains(e)) {
                    bar.println(format!("{} {}", "!".yellow(), error));
                }
                last_errors = s.recent_errors.clone();
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {},
        }
    }

    bar.abandon_with_message("Monitor stopped");
}
