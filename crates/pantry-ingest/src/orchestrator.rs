//! Ingestion orchestrator
//!
//! Walks every configured data-type partition page by page:
//! fetch → transform → buffer/flush → checkpoint. The checkpoint is saved
//! after every page, so a crashed or interrupted run resumes at the page
//! after the last one it finished, with its unwritten buffer replayed.

use crate::config::IngestConfig;
use crate::error::{FetchError, IngestError, Result, StoreError};
use crate::usda::{transform_at, FoodPage, FoodSource};
use crate::writer::{BatchWriteResult, BatchWriter, IngredientStore};
use chrono::{SecondsFormat, Utc};
use pantry_common::checkpoint::CheckpointStore;
use pantry_common::types::{CanonicalIngredient, IngestionCheckpoint, RunStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a run that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Interrupted,
}

/// Final state of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Whether the run continued an earlier checkpoint
    pub resumed: bool,
    pub checkpoint: IngestionCheckpoint,
}

/// How a partition stopped
enum PartitionEnd {
    Exhausted,
    Failed,
    Interrupted,
}

/// Drives a full ingestion run
pub struct IngestionOrchestrator<S, W> {
    config: IngestConfig,
    source: S,
    writer: BatchWriter<W>,
    checkpoints: CheckpointStore,
    cancel: CancellationToken,
    consecutive_save_failures: u32,
}

impl<S, W> IngestionOrchestrator<S, W>
where
    S: FoodSource,
    W: IngredientStore,
{
    pub fn new(config: IngestConfig, source: S, store: W, cancel: CancellationToken) -> Self {
        let writer = BatchWriter::new(store, config.batch_size);
        let checkpoints = CheckpointStore::new(&config.checkpoint_path);
        Self {
            config,
            source,
            writer,
            checkpoints,
            cancel,
            consecutive_save_failures: 0,
        }
    }

    /// Run to completion, interruption or abort.
    ///
    /// `fresh` discards any earlier checkpoint instead of resuming it.
    pub async fn run(&mut self, fresh: bool) -> Result<RunSummary> {
        self.config.validate()?;
        let (mut checkpoint, resumed) = self.prepare(fresh)?;
        self.persist(&mut checkpoint)?;

        info!(
            run_id = %checkpoint.run_id,
            resumed = resumed,
            data_type = %checkpoint.current_data_type,
            page = checkpoint.current_page + 1,
            "Starting ingestion"
        );

        let partitions = self.config.data_types.clone();
        let mut index = checkpoint.current_data_type_index;

        while index < partitions.len() {
            if checkpoint.current_data_type_index != index {
                checkpoint.enter_partition(index);
            }
            let data_type = &partitions[index];

            let end = match self.run_partition(&mut checkpoint, data_type).await {
                Ok(end) => end,
                Err(e) => return Err(self.abort(checkpoint, e).await),
            };

            if let PartitionEnd::Interrupted = end {
                return self.interrupt(checkpoint, resumed).await;
            }

            if let Err(e) = self.flush_into(&mut checkpoint).await {
                return Err(self.abort(checkpoint, e.into()).await);
            }

            info!(
                data_type = %data_type,
                processed = checkpoint.processed_items,
                failed = matches!(end, PartitionEnd::Failed),
                "Partition complete"
            );

            index += 1;
            if index < partitions.len() {
                checkpoint.enter_partition(index);
                if let Err(e) = self.persist(&mut checkpoint) {
                    return Err(self.abort(checkpoint, e).await);
                }
            }
        }

        checkpoint.status = RunStatus::Completed;
        checkpoint.batch_buffer.clear();
        checkpoint.touch(Utc::now());
        // Every record is written; only the record of completion is lost
        if let Err(e) = self.checkpoints.save(&checkpoint) {
            warn!(
                error = %e,
                path = %self.checkpoints.path().display(),
                "Final checkpoint save failed, ingestion itself completed"
            );
        }

        info!(
            run_id = %checkpoint.run_id,
            processed = checkpoint.processed_items,
            inserted = checkpoint.successful_inserts,
            duplicates = checkpoint.skipped_duplicates,
            failed = checkpoint.failed_records,
            "Ingestion complete"
        );

        Ok(RunSummary {
            outcome: RunOutcome::Completed,
            resumed,
            checkpoint,
        })
    }

    /// Load and vet the previous checkpoint, or start a new one
    fn prepare(&mut self, fresh: bool) -> Result<(IngestionCheckpoint, bool)> {
        if fresh {
            self.checkpoints.clear()?;
            info!("Starting fresh, previous checkpoint discarded");
        }

        let previous = match self.checkpoints.load() {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable checkpoint");
                None
            },
        };

        if let Some(mut checkpoint) = previous {
            if let Some(reason) = self.resume_blocker(&checkpoint) {
                info!(reason = %reason, "Not resuming previous checkpoint");
            } else {
                checkpoint.status = RunStatus::Running;
                self.writer.restore(std::mem::take(&mut checkpoint.batch_buffer));
                checkpoint.batch_buffer = self.writer.pending().to_vec();
                info!(
                    run_id = %checkpoint.run_id,
                    data_type = %checkpoint.current_data_type,
                    last_page = checkpoint.current_page,
                    buffered = checkpoint.batch_buffer.len(),
                    "Resuming from checkpoint"
                );
                return Ok((checkpoint, true));
            }
        }

        Ok((
            IngestionCheckpoint::new(self.config.data_types.clone(), Utc::now()),
            false,
        ))
    }

    fn resume_blocker(&self, checkpoint: &IngestionCheckpoint) -> Option<String> {
        if !checkpoint.status.is_resumable() {
            return Some(format!("previous run is {}", checkpoint.status));
        }
        if checkpoint.data_types != self.config.data_types {
            return Some(format!(
                "data types changed ({:?} -> {:?})",
                checkpoint.data_types, self.config.data_types
            ));
        }
        if let Err(e) = checkpoint.validate() {
            return Some(e.to_string());
        }
        None
    }

    /// Page through one partition, starting after the checkpoint's last page
    async fn run_partition(
        &mut self,
        checkpoint: &mut IngestionCheckpoint,
        data_type: &str,
    ) -> Result<PartitionEnd> {
        let page_size = u64::from(self.config.page_size);
        let mut page = checkpoint.current_page + 1;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(PartitionEnd::Interrupted);
            }
            if self.config.max_pages_per_data_type.is_some_and(|cap| page > cap) {
                debug!(data_type = %data_type, page = page, "Page cap reached");
                return Ok(PartitionEnd::Exhausted);
            }

            let food_page = match self.fetch_with_budget(checkpoint, data_type, page).await {
                Ok(Some(food_page)) => food_page,
                Ok(None) => return Ok(PartitionEnd::Interrupted),
                Err(e) if e.is_transient() => return Err(e.into()),
                Err(e) => {
                    error!(data_type = %data_type, page = page, error = %e, "Partition failed");
                    checkpoint.append_error(stamp(format!(
                        "{} failed at page {}: {}",
                        data_type, page, e
                    )));
                    self.persist(checkpoint)?;
                    return Ok(PartitionEnd::Failed);
                },
            };

            let total_hits = food_page.total_hits;
            checkpoint.record_partition_total(data_type, total_hits);
            if food_page.records.is_empty() {
                debug!(data_type = %data_type, page = page, "Empty page, partition exhausted");
                return Ok(PartitionEnd::Exhausted);
            }

            let store_failure = self.process_page(checkpoint, data_type, food_page).await;
            self.persist(checkpoint)?;
            if let Some(e) = store_failure {
                return Err(e.into());
            }

            info!(
                data_type = %data_type,
                page = page,
                processed = checkpoint.processed_items,
                total = checkpoint.total_items,
                "Page complete"
            );

            if u64::from(page) * page_size >= total_hits {
                return Ok(PartitionEnd::Exhausted);
            }
            page += 1;
        }
    }

    /// Transform a fetched page and feed it to the writer.
    ///
    /// The page counts as processed before any write happens. If a flush
    /// fails, the records not yet handed over are buffered too, so the
    /// persisted buffer holds everything that still needs writing.
    async fn process_page(
        &mut self,
        checkpoint: &mut IngestionCheckpoint,
        data_type: &str,
        food_page: FoodPage,
    ) -> Option<StoreError> {
        let synced_at = Utc::now();
        let ingredients: Vec<CanonicalIngredient> = food_page
            .records
            .into_iter()
            .map(|mut record| {
                if record.data_type.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    record.data_type = Some(data_type.to_string());
                }
                transform_at(&record, synced_at)
            })
            .collect();

        checkpoint.record_processed(ingredients.len() as u64);
        checkpoint.complete_page(food_page.page);

        let mut pending = ingredients.into_iter();
        while let Some(ingredient) = pending.next() {
            match self.writer.add(ingredient).await {
                Ok(Some(result)) => fold(checkpoint, result),
                Ok(None) => {},
                Err(e) => {
                    self.writer.restore_tail(pending);
                    error!(data_type = %data_type, page = food_page.page, error = %e, "Batch write failed");
                    return Some(e);
                },
            }
        }
        None
    }

    /// Fetch a page, retrying transient failures within the page budget.
    ///
    /// `Ok(None)` means the run was cancelled while waiting.
    async fn fetch_with_budget(
        &self,
        checkpoint: &mut IngestionCheckpoint,
        data_type: &str,
        page: u32,
    ) -> std::result::Result<Option<FoodPage>, FetchError> {
        let mut retries = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                result = self.source.fetch_page(data_type, page) => result,
            };

            match result {
                Ok(food_page) => return Ok(Some(food_page)),
                Err(e) if e.is_transient() && retries < self.config.page_retry_budget => {
                    retries += 1;
                    warn!(
                        data_type = %data_type,
                        page = page,
                        retry = retries,
                        budget = self.config.page_retry_budget,
                        error = %e,
                        "Page fetch failed, retrying"
                    );
                    checkpoint.append_error(stamp(format!(
                        "{} page {} retry {}/{}: {}",
                        data_type, page, retries, self.config.page_retry_budget, e
                    )));

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(self.config.page_retry_delay()) => {},
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Flush the writer and fold the result into the checkpoint
    async fn flush_into(
        &mut self,
        checkpoint: &mut IngestionCheckpoint,
    ) -> std::result::Result<(), StoreError> {
        let result = self.writer.flush().await?;
        fold(checkpoint, result);
        checkpoint.batch_buffer.clear();
        Ok(())
    }

    /// Mirror the buffer into the checkpoint and save it.
    ///
    /// A failed save is tolerated until `max_save_failures` happen in a row.
    fn persist(&mut self, checkpoint: &mut IngestionCheckpoint) -> Result<()> {
        checkpoint.batch_buffer = self.writer.pending().to_vec();
        checkpoint.touch(Utc::now());

        match self.checkpoints.save(checkpoint) {
            Ok(()) => {
                self.consecutive_save_failures = 0;
                Ok(())
            },
            Err(e) => {
                self.consecutive_save_failures += 1;
                warn!(
                    error = %e,
                    consecutive = self.consecutive_save_failures,
                    limit = self.config.max_save_failures,
                    "Checkpoint save failed, continuing in memory"
                );
                if self.consecutive_save_failures >= self.config.max_save_failures {
                    return Err(IngestError::aborted(format!(
                        "checkpoint could not be saved {} times in a row: {}",
                        self.consecutive_save_failures, e
                    )));
                }
                Ok(())
            },
        }
    }

    /// Flush, persist as interrupted and report a clean stop
    async fn interrupt(&mut self, mut checkpoint: IngestionCheckpoint, resumed: bool) -> Result<RunSummary> {
        if let Err(e) = self.flush_into(&mut checkpoint).await {
            warn!(error = %e, buffered = self.writer.len(), "Flush on interrupt failed, buffer kept");
        }
        checkpoint.status = RunStatus::Interrupted;
        self.persist(&mut checkpoint)?;

        info!(
            run_id = %checkpoint.run_id,
            data_type = %checkpoint.current_data_type,
            last_page = checkpoint.current_page,
            processed = checkpoint.processed_items,
            "Ingestion interrupted, progress saved"
        );

        Ok(RunSummary {
            outcome: RunOutcome::Interrupted,
            resumed,
            checkpoint,
        })
    }

    /// Flush what can be flushed, persist as aborted and hand back the cause
    async fn abort(&mut self, mut checkpoint: IngestionCheckpoint, cause: IngestError) -> IngestError {
        if let Err(e) = self.flush_into(&mut checkpoint).await {
            warn!(error = %e, buffered = self.writer.len(), "Flush on abort failed, buffer kept");
        }
        checkpoint.status = RunStatus::Aborted;
        checkpoint.append_error(stamp(format!("aborted: {}", cause)));
        checkpoint.batch_buffer = self.writer.pending().to_vec();
        checkpoint.touch(Utc::now());

        if let Err(e) = self.checkpoints.save(&checkpoint) {
            error!(error = %e, "Failed to save checkpoint after abort");
        }

        error!(
            run_id = %checkpoint.run_id,
            data_type = %checkpoint.current_data_type,
            last_page = checkpoint.current_page,
            error = %cause,
            "Ingestion aborted"
        );
        cause
    }
}

fn fold(checkpoint: &mut IngestionCheckpoint, result: BatchWriteResult) {
    checkpoint.record_writes(result.inserted, result.duplicates, result.failures.len() as u64);
    for failure in result.failures {
        checkpoint.append_error(stamp(format!("fdc_id {}: {}", failure.fdc_id, failure.error)));
    }
}

/// Prefix an error message with the current UTC time
fn stamp(message: String) -> String {
    format!("[{}] {}", Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true), message)
}
