//! Vessel tracking table
//!
//! Last known kinematic state per vessel, keyed by MMSI. Entries are
//! replaced on every accepted report and removed once they go stale.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ReportError;
use crate::vessel::VesselState;

#[derive(Debug, Default)]
pub struct VesselTable {
    vessels: HashMap<String, VesselState>,
}

impl VesselTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the state for `state.mmsi`
    ///
    /// A report older than the one already tracked is rejected and the
    /// table is left unchanged; a repeated timestamp replaces the entry.
    pub fn upsert(&mut self, state: VesselState) -> Result<(), ReportError> {
        if let Some(tracked) = self.vessels.get(&state.mmsi) {
            if state.timestamp < tracked.timestamp {
                return Err(ReportError::OutOfOrder {
                    mmsi: state.mmsi,
                    timestamp: state.timestamp,
                    tracked: tracked.timestamp,
                });
            }
        }
        self.vessels.insert(state.mmsi.clone(), state);
        Ok(())
    }

    /// Remove every vessel not heard from within `timeout` of `now`
    ///
    /// Returns the removed states so open encounters can be closed with the
    /// last known position.
    pub fn expire_stale(&mut self, now: DateTime<Utc>, timeout: TimeDelta) -> Vec<VesselState> {
        let cutoff = now - timeout;
        let stale: Vec<String> = self
            .vessels
            .values()
            .filter(|v| v.received_at < cutoff)
            .map(|v| v.mmsi.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|mmsi| self.vessels.remove(&mmsi))
            .collect()
    }

    /// All tracked vessels
    pub fn snapshot(&self) -> impl Iterator<Item = &VesselState> {
        self.vessels.values()
    }

    pub fn get(&self, mmsi: &str) -> Option<&VesselState> {
        self.vessels.get(mmsi)
    }

    pub fn contains(&self, mmsi: &str) -> bool {
        self.vessels.contains_key(mmsi)
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }
}
