//! Batched writes into the ingredient store
//!
//! [`BatchWriter`] buffers transformed records and hands them to an
//! [`IngredientStore`] once the batch is full. The buffer survives a failed
//! flush so the orchestrator can persist it in the checkpoint and replay it
//! on the next run.

use crate::error::StoreError;
use async_trait::async_trait;
use pantry_common::types::CanonicalIngredient;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Result of writing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New row
    Inserted,
    /// A row with this id already existed (it has been refreshed)
    Duplicate,
    /// The record could not be written; the rest of the batch was
    Failed(String),
}

/// Destination of canonical ingredients, keyed by external id
#[async_trait]
pub trait IngredientStore: Send + Sync {
    /// Upsert every record and report one outcome per record, in order.
    ///
    /// An `Err` means nothing from the batch was committed.
    async fn upsert_batch(
        &self,
        records: &[CanonicalIngredient],
    ) -> Result<Vec<UpsertOutcome>, StoreError>;
}

#[async_trait]
impl<S: IngredientStore + ?Sized> IngredientStore for Arc<S> {
    async fn upsert_batch(
        &self,
        records: &[CanonicalIngredient],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        (**self).upsert_batch(records).await
    }
}

/// A record that failed to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub fdc_id: i64,
    pub error: String,
}

/// Outcome of one flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteResult {
    pub inserted: u64,
    pub duplicates: u64,
    pub failures: Vec<RecordFailure>,
}

impl BatchWriteResult {
    fn from_outcomes(records: &[CanonicalIngredient], outcomes: Vec<UpsertOutcome>) -> Self {
        let mut result = Self::default();
        for (record, outcome) in records.iter().zip(outcomes) {
            match outcome {
                UpsertOutcome::Inserted => result.inserted += 1,
                UpsertOutcome::Duplicate => result.duplicates += 1,
                UpsertOutcome::Failed(error) => result.failures.push(RecordFailure {
                    fdc_id: record.fdc_id,
                    error,
                }),
            }
        }
        result
    }

    /// Records accounted for by this flush
    pub fn total(&self) -> u64 {
        self.inserted + self.duplicates + self.failures.len() as u64
    }
}

/// Buffers records and flushes them in batches
pub struct BatchWriter<S> {
    store: S,
    batch_size: usize,
    buffer: Vec<CanonicalIngredient>,
}

impl<S: IngredientStore> BatchWriter<S> {
    pub fn new(store: S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    /// Records waiting for the next flush
    pub fn pending(&self) -> &[CanonicalIngredient] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Put back records buffered by an earlier run, ahead of anything new
    pub fn restore(&mut self, records: Vec<CanonicalIngredient>) {
        if records.is_empty() {
            return;
        }
        debug!(records = records.len(), "Restoring buffered records");
        let newer = std::mem::replace(&mut self.buffer, records);
        self.buffer.extend(newer);
    }

    /// Buffer records without flushing, behind anything already pending
    pub fn restore_tail(&mut self, records: impl IntoIterator<Item = CanonicalIngredient>) {
        self.buffer.extend(records);
    }

    /// Buffer a record, flushing when the batch is full
    pub async fn add(
        &mut self,
        record: CanonicalIngredient,
    ) -> Result<Option<BatchWriteResult>, StoreError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    /// Write everything buffered as one batch.
    ///
    /// On a store failure the buffer is left untouched.
    pub async fn flush(&mut self) -> Result<BatchWriteResult, StoreError> {
        if self.buffer.is_empty() {
            return Ok(BatchWriteResult::default());
        }

        let outcomes = self.store.upsert_batch(&self.buffer).await?;
        if outcomes.len() != self.buffer.len() {
            return Err(StoreError::Unavailable(format!(
                "store reported {} outcomes for {} records",
                outcomes.len(),
                self.buffer.len()
            )));
        }

        let result = BatchWriteResult::from_outcomes(&self.buffer, outcomes);
        for failure in &result.failures {
            warn!(fdc_id = failure.fdc_id, error = %failure.error, "Record write failed");
        }
        debug!(
            inserted = result.inserted,
            duplicates = result.duplicates,
            failed = result.failures.len(),
            "Flushed batch"
        );

        self.buffer.clear();
        Ok(result)
    }
}

/// In-process store used for dry runs and tests
#[derive(Default)]
pub struct MemoryIngredientStore {
    rows: Mutex<BTreeMap<i64, CanonicalIngredient>>,
    rejected: Mutex<HashSet<i64>>,
    unavailable: AtomicBool,
}

impl MemoryIngredientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write of `fdc_id` fail
    pub async fn reject(&self, fdc_id: i64) {
        self.rejected.lock().await.insert(fdc_id);
    }

    /// Make whole batches fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    pub async fn get(&self, fdc_id: i64) -> Option<CanonicalIngredient> {
        self.rows.lock().await.get(&fdc_id).cloned()
    }

    pub async fn ids(&self) -> Vec<i64> {
        self.rows.lock().await.keys().copied().collect()
    }
}

#[async_trait]
impl IngredientStore for MemoryIngredientStore {
    async fn upsert_batch(
        &self,
        records: &[CanonicalIngredient],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }

        let rejected = self.rejected.lock().await;
        let mut rows = self.rows.lock().await;
        let outcomes = records
            .iter()
            .map(|record| {
                if rejected.contains(&record.fdc_id) {
                    UpsertOutcome::Failed(format!("record {} rejected", record.fdc_id))
                } else if rows.insert(record.fdc_id, record.clone()).is_some() {
                    UpsertOutcome::Duplicate
                } else {
                    UpsertOutcome::Inserted
                }
            })
            .collect();
        Ok(outcomes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::usda::{transform_at, ExternalFoodRecord};
    use chrono::DateTime;

    fn ingredient(fdc_id: i64) -> CanonicalIngredient {
        let record = ExternalFoodRecord {
            fdc_id,
            description: format!("Food {}", fdc_id),
            data_type: Some("Foundation".to_string()),
            ..Default::default()
        };
        transform_at(&record, DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[tokio::test]
    async fn test_add_flushes_at_batch_size() {
        let store = Arc::new(MemoryIngredientStore::new());
        let mut writer = BatchWriter::new(store.clone(), 2);

        assert!(writer.add(ingredient(1)).await.unwrap().is_none());
        let result = writer.add(ingredient(2)).await.unwrap().unwrap();

        assert_eq!(result.inserted, 2);
        assert!(writer.is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_is_skip_not_error() {
        let store = Arc::new(MemoryIngredientStore::new());
        let mut writer = BatchWriter::new(store.clone(), 10);

        writer.add(ingredient(7)).await.unwrap();
        let first = writer.flush().await.unwrap();
        writer.add(ingredient(7)).await.unwrap();
        let second = writer.flush().await.unwrap();

        assert_eq!((first.inserted, first.duplicates), (1, 0));
        assert_eq!((second.inserted, second.duplicates), (0, 1));
        assert!(second.failures.is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_does_not_abort_batch() {
        let store = Arc::new(MemoryIngredientStore::new());
        store.reject(2).await;
        let mut writer = BatchWriter::new(store.clone(), 10);

        for id in 1..=3 {
            writer.add(ingredient(id)).await.unwrap();
        }
        let result = writer.flush().await.unwrap();

        assert_eq!(result.inserted, 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].fdc_id, 2);
        assert_eq!(result.total(), 3);
        assert_eq!(store.ids().await, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_buffer() {
        let store = Arc::new(MemoryIngredientStore::new());
        store.set_unavailable(true);
        let mut writer = BatchWriter::new(store.clone(), 2);

        writer.add(ingredient(1)).await.unwrap();
        assert!(writer.add(ingredient(2)).await.is_err());
        assert_eq!(writer.len(), 2);

        store.set_unavailable(false);
        let result = writer.flush().await.unwrap();
        assert_eq!(result.inserted, 2);
        assert!(writer.is_empty());
    }

    #[tokio::test]
    async fn test_restore_goes_ahead_of_new_records() {
        let mut writer = BatchWriter::new(MemoryIngredientStore::new(), 10);
        writer.add(ingredient(3)).await.unwrap();
        writer.restore(vec![ingredient(1), ingredient(2)]);

        let ids: Vec<_> = writer.pending().iter().map(|r| r.fdc_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_flush_empty_is_noop() {
        let mut writer = BatchWriter::new(MemoryIngredientStore::new(), 10);
        assert_eq!(writer.flush().await.unwrap(), BatchWriteResult::default());
    }
}
