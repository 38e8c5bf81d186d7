//! Durable ingestion progress record
//!
//! The checkpoint is the only contract between the ingestion run (single
//! writer) and the monitor/status commands (readers). Field names are
//! camelCase on disk.

use crate::error::{PantryError, Result};
use crate::types::CanonicalIngredient;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Maximum number of error strings kept in a checkpoint
pub const MAX_CHECKPOINT_ERRORS: usize = 50;

/// Lifecycle of a run as recorded in its checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Interrupted,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Aborted => "aborted",
        }
    }

    /// Whether a new `run` should pick this checkpoint up where it stopped
    pub fn is_resumable(&self) -> bool {
        !matches!(self, RunStatus::Completed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion progress snapshot persisted after every page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionCheckpoint {
    #[serde(default = "Uuid::new_v4")]
    pub run_id: Uuid,
    #[serde(default)]
    pub status: RunStatus,
    /// Estimated from the API's per-partition hit counts
    pub total_items: u64,
    pub processed_items: u64,
    /// Last page fully processed in the current partition (0 = none yet)
    pub current_page: u32,
    pub current_data_type: String,
    pub current_data_type_index: usize,
    pub start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub successful_inserts: u64,
    pub skipped_duplicates: u64,
    #[serde(default)]
    pub failed_records: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Records accepted but not yet flushed to the ingredient store
    #[serde(default)]
    pub batch_buffer: Vec<CanonicalIngredient>,
    /// Partition labels in processing order
    #[serde(default)]
    pub data_types: Vec<String>,
    /// `totalHits` reported by the API, per partition
    #[serde(default)]
    pub partition_totals: BTreeMap<String, u64>,
}

impl IngestionCheckpoint {
    /// Fresh checkpoint positioned before the first page of the first partition
    pub fn new(data_types: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Running,
            total_items: 0,
            processed_items: 0,
            current_page: 0,
            current_data_type: data_types.first().cloned().unwrap_or_default(),
            current_data_type_index: 0,
            start_time: now,
            last_update_time: now,
            errors: Vec::new(),
            successful_inserts: 0,
            skipped_duplicates: 0,
            failed_records: 0,
            estimated_completion: None,
            batch_buffer: Vec::new(),
            data_types,
            partition_totals: BTreeMap::new(),
        }
    }

    /// Append an error, dropping the oldest entries beyond [`MAX_CHECKPOINT_ERRORS`]
    pub fn append_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        if self.errors.len() > MAX_CHECKPOINT_ERRORS {
            let excess = self.errors.len() - MAX_CHECKPOINT_ERRORS;
            self.errors.drain(..excess);
        }
    }

    /// Most recent `n` errors, newest last
    pub fn recent_errors(&self, n: usize) -> &[String] {
        let start = self.errors.len().saturating_sub(n);
        &self.errors[start..]
    }

    /// Record the hit count of a partition and re-derive the total estimate
    pub fn record_partition_total(&mut self, data_type: &str, total_hits: u64) {
        self.partition_totals.insert(data_type.to_string(), total_hits);
        self.recompute_total();
    }

    /// Count records fetched and transformed from one page
    pub fn record_processed(&mut self, count: u64) {
        self.processed_items += count;
        self.recompute_total();
    }

    /// Fold one flush outcome into the cumulative counters
    pub fn record_writes(&mut self, inserted: u64, duplicates: u64, failed: u64) {
        self.successful_inserts += inserted;
        self.skipped_duplicates += duplicates;
        self.failed_records += failed;
    }

    /// Mark `page` as fully processed in the current partition
    pub fn complete_page(&mut self, page: u32) {
        self.current_page = page;
    }

    /// Move to the partition at `index`, before its first page
    pub fn enter_partition(&mut self, index: usize) {
        self.current_data_type_index = index;
        self.current_data_type = self.data_types.get(index).cloned().unwrap_or_default();
        self.current_page = 0;
    }

    /// Stamp the update time and refresh the completion estimate
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_time = now;
        self.estimated_completion = self.estimate_completion(now);
    }

    fn recompute_total(&mut self) {
        let known: u64 = self.partition_totals.values().sum();
        self.total_items = known.max(self.processed_items);
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> Option<f64> {
        let elapsed_ms = (now - self.start_time).num_milliseconds();
        (elapsed_ms > 0).then(|| elapsed_ms as f64 / 1000.0)
    }

    /// Items processed per second since the run started
    pub fn throughput(&self, now: DateTime<Utc>) -> Option<f64> {
        let elapsed = self.elapsed_secs(now)?;
        Some(self.processed_items as f64 / elapsed)
    }

    /// Fraction of the estimated total already processed
    pub fn progress_ratio(&self) -> Option<f64> {
        (self.total_items > 0).then(|| (self.processed_items as f64 / self.total_items as f64).min(1.0))
    }

    /// Projected completion time from the average rate so far.
    ///
    /// `None` when nothing has been processed or no time has elapsed.
    pub fn estimate_completion(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let rate = self.throughput(now)?;
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total_items.saturating_sub(self.processed_items);
        if remaining == 0 {
            return Some(now);
        }
        let remaining_ms = (remaining as f64 / rate * 1000.0).ceil().max(1.0);
        let delta = Duration::try_milliseconds(remaining_ms as i64)?;
        now.checked_add_signed(delta)
    }

    /// Check the structural invariants of a loaded checkpoint
    pub fn validate(&self) -> Result<()> {
        if !self.data_types.is_empty() && self.current_data_type_index >= self.data_types.len() {
            return Err(PantryError::invalid_checkpoint(format!(
                "partition index {} out of range for {} partitions",
                self.current_data_type_index,
                self.data_types.len()
            )));
        }
        if self.total_items > 0 && self.processed_items > self.total_items {
            return Err(PantryError::invalid_checkpoint(format!(
                "processed {} exceeds total {}",
                self.processed_items, self.total_items
            )));
        }
        let written = self.successful_inserts + self.skipped_duplicates + self.failed_records;
        if written > self.processed_items {
            return Err(PantryError::invalid_checkpoint(format!(
                "{} records written but only {} processed",
                written, self.processed_items
            )));
        }
        Ok(())
    }
}
