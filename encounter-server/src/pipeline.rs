//! Ingest pipeline: decoded AIS lines in, buffered records out.
//!
//! The pipeline owns the engine and drives it sequentially from one task.
//! On shutdown, or when input ends, every open encounter is force-closed and
//! the buffer gets a final flush before the subsystem returns.

use std::sync::Arc;
use std::time::Duration;

use encounter_core::{AisEvent, Clock, EncounterEngine};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::ais;
use crate::buffer::RecordBuffer;
use crate::error::StorageError;
use crate::store::RecordStore;

/// Log a progress line every this many messages
const PROGRESS_EVERY: u64 = 1000;

/// Message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Lines received
    pub messages: u64,
    /// Lines that did not decode
    pub undecodable: u64,
    /// Decoded events the engine rejected
    pub rejected: u64,
    /// Records handed to the buffer
    pub records: u64,
}

pub struct Pipeline<C: Clock, S: RecordStore> {
    engine: EncounterEngine<C>,
    buffer: Arc<RecordBuffer<S>>,
    stats_interval: Duration,
    stats: PipelineStats,
}

impl<C: Clock, S: RecordStore> Pipeline<C, S> {
    pub fn new(
        engine: EncounterEngine<C>,
        buffer: Arc<RecordBuffer<S>>,
        stats_interval: Duration,
    ) -> Self {
        Pipeline {
            engine,
            buffer,
            stats_interval,
            stats: PipelineStats::default(),
        }
    }

    pub fn engine(&self) -> &EncounterEngine<C> {
        &self.engine
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Decode one input line and feed it through the engine
    pub async fn handle_line(&mut self, line: &str) {
        self.stats.messages += 1;
        if self.stats.messages % PROGRESS_EVERY == 0 {
            info!(
                "Processed {} messages, {} vessels tracked",
                self.stats.messages,
                self.engine.vessels().len()
            );
        }

        match ais::decode(line, self.engine.now()) {
            Ok(Some(event)) => self.handle_event(event).await,
            Ok(None) => {}
            Err(e) => {
                self.stats.undecodable += 1;
                debug!("Skipping message: {}", e);
            }
        }
    }

    pub async fn handle_event(&mut self, event: AisEvent) {
        match self.engine.process(event) {
            Ok(records) => {
                self.stats.records += records.len() as u64;
                self.buffer.enqueue_all(records).await;
            }
            Err(e) => {
                self.stats.rejected += 1;
                if e.is_routine() {
                    debug!("Dropped report: {}", e);
                } else {
                    warn!("Dropped report: {}", e);
                }
            }
        }
    }

    pub fn log_stats(&self) {
        let engine = self.engine.stats();
        info!(
            "Stats: {} messages, {} vessels tracked, {} encounters open, {} opened, {} closed, {} records queued",
            self.stats.messages,
            engine.tracked_vessels,
            engine.open_encounters,
            engine.total_opened,
            engine.total_closed,
            self.buffer.len()
        );
    }

    /// Close every open encounter and flush everything that is queued
    pub async fn finish(&mut self) -> Result<(), StorageError> {
        let records = self.engine.shutdown();
        if !records.is_empty() {
            info!(
                "Closing {} open encounters",
                records
                    .iter()
                    .filter(|r| matches!(r, encounter_core::Record::Encounter(_)))
                    .count()
            );
        }
        self.stats.records += records.len() as u64;
        self.buffer.enqueue_all(records).await;
        self.buffer.shutdown_flush().await?;
        self.log_stats();
        Ok(())
    }

    /// Pipeline subsystem
    ///
    /// Runs until shutdown is requested or the input channel closes, then
    /// finishes and requests shutdown of everything else. A failed final
    /// flush is returned so the process exits with an error.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<String>,
        subsys: SubsystemHandle,
    ) -> Result<(), StorageError> {
        let mut stats_timer = interval_at(Instant::now() + self.stats_interval, self.stats_interval);
        stats_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    info!("Pipeline: shutdown requested");
                    break;
                }
                line = rx.recv() => {
                    match line {
                        Some(line) => self.handle_line(&line).await,
                        None => {
                            info!("Pipeline: input finished");
                            break;
                        }
                    }
                }
                _ = stats_timer.tick() => self.log_stats(),
            }
        }

        let result = self.finish().await;
        subsys.request_shutdown();
        result
    }
}
