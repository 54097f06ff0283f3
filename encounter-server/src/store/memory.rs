use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use encounter_core::records::{Record, Table};

use super::{Batch, RecordStore};
use crate::error::StorageError;

/// In-memory store for tests; can be told to fail or slow down writes
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    batches: Mutex<Vec<Batch>>,
    failures: AtomicUsize,
    attempts: AtomicUsize,
    delay: Mutex<Duration>,
}

impl MemoryStore {
    /// Make every following write take at least `delay`
    pub fn delay_writes(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Fail the next `count` writes
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<Record> {
        self.batches()
            .into_iter()
            .flat_map(Batch::into_records)
            .collect()
    }

    /// Every call to `write_batch`, failed or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn write_batch(&self, batch: &Batch) -> Result<usize, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Write {
                table: batch.tables().next().map_or(Table::Positions, |(table, _)| table),
                path: PathBuf::from("memory"),
                source: io::Error::other("injected failure"),
            });
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(batch.len())
    }
}
