//! Buffered persistence.
//!
//! Records from the engine are queued here and written to the store in bulk,
//! either when `batch_size` records are waiting or when `flush_interval` has
//! passed since the last flush. The queue is guarded by a short std mutex
//! that is never held across an await; bulk writes are serialized by a
//! separate async mutex, so queueing never waits on the store.

use std::mem;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use encounter_core::records::Record;
use log::{debug, error, info, warn};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::config::BufferSettings;
use crate::error::StorageError;
use crate::store::{Batch, RecordStore};

/// Upper bound for the flush timer's check period
const MAX_CHECK_PERIOD: Duration = Duration::from_secs(1);

struct Queue {
    records: Vec<Record>,
    last_flush: Instant,
}

pub struct RecordBuffer<S: RecordStore> {
    store: S,
    batch_size: usize,
    flush_interval: Duration,
    queue: Mutex<Queue>,
    /// Held for the duration of a bulk write
    flush_lock: tokio::sync::Mutex<()>,
}

impl<S: RecordStore> RecordBuffer<S> {
    pub fn new(store: S, batch_size: usize, flush_interval: Duration) -> Self {
        RecordBuffer {
            store,
            batch_size: batch_size.max(1),
            flush_interval,
            queue: Mutex::new(Queue {
                records: Vec::new(),
                last_flush: Instant::now(),
            }),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_settings(store: S, settings: &BufferSettings) -> Self {
        Self::new(store, settings.batch_size, settings.flush_interval())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        // The queue is only pushed to or swapped out, so it is consistent
        // even if a holder panicked
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records waiting to be written
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Queue one record, flushing if the batch is full
    pub async fn enqueue(&self, record: Record) {
        let full = {
            let mut queue = self.lock();
            queue.records.push(record);
            queue.records.len() >= self.batch_size
        };
        if full {
            self.flush_full().await;
        }
    }

    /// Queue several records, flushing once if the batch is full
    pub async fn enqueue_all(&self, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        let full = {
            let mut queue = self.lock();
            queue.records.extend(records);
            queue.records.len() >= self.batch_size
        };
        if full {
            self.flush_full().await;
        }
    }

    /// Size-triggered flush; skipped while another bulk write is in flight,
    /// whose records the next trigger or the timer picks up
    async fn flush_full(&self) {
        let Ok(_flushing) = self.flush_lock.try_lock() else {
            debug!("Batch full while a write is in flight, {} records waiting", self.len());
            return;
        };
        if let Err(e) = self.write_queued().await {
            warn!("Flush failed, {} records kept for retry: {}", self.len(), e);
        }
    }

    /// Write everything queued in one bulk write
    ///
    /// Waits for a write already in flight. On failure the records go back in
    /// front of anything queued since, and the error is returned.
    pub async fn flush(&self) -> Result<usize, StorageError> {
        let _flushing = self.flush_lock.lock().await;
        self.write_queued().await
    }

    /// Caller holds `flush_lock`
    async fn write_queued(&self) -> Result<usize, StorageError> {
        let records = {
            let mut queue = self.lock();
            queue.last_flush = Instant::now();
            mem::take(&mut queue.records)
        };
        if records.is_empty() {
            return Ok(0);
        }

        let batch = Batch::from_records(records);
        match self.store.write_batch(&batch).await {
            Ok(written) => {
                debug!("Flushed {} records", written);
                Ok(written)
            }
            Err(e) => {
                let mut queue = self.lock();
                let mut restored = batch.into_records();
                restored.append(&mut queue.records);
                queue.records = restored;
                Err(e)
            }
        }
    }

    /// Flush if records are waiting and the flush interval has elapsed
    pub async fn flush_if_due(&self) -> Result<usize, StorageError> {
        let due = {
            let queue = self.lock();
            !queue.records.is_empty() && queue.last_flush.elapsed() >= self.flush_interval
        };
        if due {
            self.flush().await
        } else {
            Ok(0)
        }
    }

    /// Final flush on the way out; a failure here loses data
    pub async fn shutdown_flush(&self) -> Result<usize, StorageError> {
        match self.flush().await {
            Ok(written) => {
                info!("Final flush wrote {} records", written);
                Ok(written)
            }
            Err(e) => {
                error!("Final flush failed, {} records not written: {}", self.len(), e);
                Err(e)
            }
        }
    }

    fn check_period(&self) -> Duration {
        (self.flush_interval / 5).clamp(Duration::from_millis(1), MAX_CHECK_PERIOD)
    }

    /// Periodic flush task, runs until shutdown is requested
    pub async fn run_flush_timer(&self, subsys: SubsystemHandle) -> Result<(), StorageError> {
        let mut timer = interval(self.check_period());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    debug!("Flush timer: shutdown requested");
                    break;
                }
                _ = timer.tick() => {
                    if let Err(e) = self.flush_if_due().await {
                        warn!("Periodic flush failed, {} records kept for retry: {}", self.len(), e);
                    }
                }
            }
        }
        Ok(())
    }
}
