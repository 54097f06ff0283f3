//! Encounter episodes
//!
//! An encounter is keyed by an unordered [`VesselPair`] and lives through
//! three states:
//!
//! ```text
//!   Absent ──(both moving, distance < start)──► Open ──(distance > end,
//!                                                       vessel timeout,
//!                                                       max duration,
//!                                                       shutdown)──► Closed
//! ```
//!
//! Closed is terminal: the summary is handed to persistence and the pair
//! returns to Absent, free to start a new episode.

mod engine;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{self, Classification, ColregsThresholds, CpaResult, LocalFrame};
use crate::records::{
    CloseReason, EncounterPositionRecord, EncounterRecord, PositionRecord, Record,
};
use crate::vessel::VesselState;

pub use engine::{EncounterEngine, EngineStats};

/// Unordered pair of vessel identities, always stored sorted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VesselPair {
    a: String,
    b: String,
}

impl VesselPair {
    pub fn new(x: &str, y: &str) -> Self {
        if x <= y {
            VesselPair {
                a: x.to_string(),
                b: y.to_string(),
            }
        } else {
            VesselPair {
                a: y.to_string(),
                b: x.to_string(),
            }
        }
    }

    /// Lower identity of the pair
    pub fn a(&self) -> &str {
        &self.a
    }

    /// Higher identity of the pair
    pub fn b(&self) -> &str {
        &self.b
    }

    pub fn contains(&self, mmsi: &str) -> bool {
        self.a == mmsi || self.b == mmsi
    }
}

impl std::fmt::Display for VesselPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// Stable encounter identity: pair, start time in milliseconds and the
/// engine's episode sequence number
///
/// The sequence keeps a pair that closes and reopens on the same timestamp
/// apart, while replaying the same input still yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncounterId(String);

impl EncounterId {
    pub fn new(a: &str, b: &str, start_time: DateTime<Utc>, sequence: u64) -> Self {
        EncounterId(format!(
            "{}-{}-{}-{}",
            a,
            b,
            start_time.timestamp_millis(),
            sequence
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EncounterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open encounter episode
#[derive(Debug, Clone)]
pub struct Encounter {
    pub id: EncounterId,
    pub pair: VesselPair,
    /// Report time of the update that opened the episode
    pub start_time: DateTime<Utc>,
    /// Clock time the episode was opened, drives the maximum duration
    pub opened_at: DateTime<Utc>,
    pub min_distance_m: f64,
    pub min_distance_time: DateTime<Utc>,
    /// Computed once at start
    pub cpa: CpaResult,
    /// Computed once at start
    pub classification: Classification,
    /// Every snapshot of either vessel recorded while open
    pub snapshots: Vec<PositionRecord>,
    last_seen: DateTime<Utc>,
}

impl Encounter {
    /// Open episode number `sequence` between `a` and `b`, which must be
    /// ordered like `pair`
    pub(crate) fn open(
        pair: VesselPair,
        sequence: u64,
        (a, b): (&VesselState, &VesselState),
        distance_m: f64,
        start_time: DateTime<Utc>,
        thresholds: &ColregsThresholds,
        now: DateTime<Utc>,
    ) -> Self {
        let frame = LocalFrame::for_pair(a.position, b.position);
        let cpa = geometry::closest_approach(
            frame.project(a.position),
            a.velocity(),
            frame.project(b.position),
            b.velocity(),
        );
        let classification = geometry::classify_encounter(
            geometry::bearing(a.position, b.position),
            a.cog,
            b.cog,
            thresholds,
        );

        Encounter {
            id: EncounterId::new(pair.a(), pair.b(), start_time, sequence),
            pair,
            start_time,
            opened_at: now,
            min_distance_m: distance_m,
            min_distance_time: start_time,
            cpa,
            classification,
            snapshots: vec![PositionRecord::from(a), PositionRecord::from(b)],
            last_seen: start_time.max(a.timestamp).max(b.timestamp),
        }
    }

    /// Record an update of one participant at the given separation
    pub(crate) fn observe(&mut self, state: &VesselState, distance_m: f64) -> Record {
        if distance_m < self.min_distance_m {
            self.min_distance_m = distance_m;
            self.min_distance_time = state.timestamp;
        }
        self.push_snapshot(state)
    }

    /// Record the last known state of a participant unless it is already in
    /// the episode
    pub(crate) fn record_final(&mut self, state: &VesselState) -> Option<Record> {
        let known = self
            .snapshots
            .iter()
            .any(|s| s.mmsi == state.mmsi && s.timestamp == state.timestamp);
        if known {
            None
        } else {
            Some(self.push_snapshot(state))
        }
    }

    fn push_snapshot(&mut self, state: &VesselState) -> Record {
        let position = PositionRecord::from(state);
        self.last_seen = self.last_seen.max(position.timestamp);
        self.snapshots.push(position.clone());
        Record::EncounterPosition(EncounterPositionRecord {
            encounter_id: self.id.clone(),
            position,
        })
    }

    /// Time since the episode was opened
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.opened_at
    }

    /// Time of the most recent snapshot, used as the end time on close
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Encounter-scoped snapshot records for everything recorded so far
    pub fn snapshot_records(&self) -> impl Iterator<Item = Record> + '_ {
        self.snapshots.iter().map(|position| {
            Record::EncounterPosition(EncounterPositionRecord {
                encounter_id: self.id.clone(),
                position: position.clone(),
            })
        })
    }

    /// Summary record; `close` is set once the episode ends
    pub fn summary(&self, close: Option<CloseReason>) -> EncounterRecord {
        EncounterRecord {
            id: self.id.clone(),
            vessel_a: self.pair.a().to_string(),
            vessel_b: self.pair.b().to_string(),
            start_time: self.start_time,
            end_time: close.map(|_| self.last_seen),
            min_distance_m: self.min_distance_m,
            min_distance_time: self.min_distance_time,
            cpa_m: self.cpa.cpa_m,
            tcpa_s: self.cpa.tcpa_s,
            encounter_type: self.classification.encounter_type,
            relative_bearing: self.classification.relative_bearing,
            close_reason: close,
            snapshot_count: self.snapshots.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{EncounterType, GeoPoint};
    use chrono::TimeZone;

    fn state(mmsi: &str, lat: f64, cog: f64, secs: i64) -> VesselState {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(secs);
        VesselState {
            mmsi: mmsi.to_string(),
            position: GeoPoint::new(lat, 4.0),
            sog: 10.0,
            cog,
            heading: None,
            timestamp: ts,
            received_at: ts,
        }
    }

    #[test]
    fn test_pair_is_order_independent() {
        let p1 = VesselPair::new("244000002", "244000001");
        let p2 = VesselPair::new("244000001", "244000002");
        assert_eq!(p1, p2);
        assert_eq!(p1.a(), "244000001");
        assert_eq!(p1.b(), "244000002");
        assert!(p1.contains("244000002"));
    }

    #[test]
    fn test_open_computes_geometry_once() {
        let a = state("1", 52.0, 0.0, 0);
        let b = state("2", 52.04, 180.0, 0);
        let pair = VesselPair::new("1", "2");
        let mut encounter = Encounter::open(
            pair,
            1,
            (&a, &b),
            4_448.0,
            a.timestamp,
            &ColregsThresholds::default(),
            a.received_at,
        );

        assert_eq!(encounter.classification.encounter_type, EncounterType::HeadOn);
        assert!(encounter.cpa.tcpa_s > 0.0);
        assert!(encounter.cpa.cpa_m < 1.0);
        assert_eq!(encounter.snapshots.len(), 2);

        let cpa = encounter.cpa;
        let closer = state("2", 52.02, 180.0, 60);
        encounter.observe(&closer, 2_224.0);
        assert_eq!(encounter.cpa, cpa);
        assert_eq!(encounter.min_distance_m, 2_224.0);
        assert_eq!(encounter.min_distance_time, closer.timestamp);
        assert_eq!(encounter.last_seen(), closer.timestamp);
    }

    #[test]
    fn test_record_final_skips_known_snapshot() {
        let a = state("1", 52.0, 0.0, 0);
        let b = state("2", 52.01, 0.0, 0);
        let mut encounter = Encounter::open(
            VesselPair::new("1", "2"),
            1,
            (&a, &b),
            1_112.0,
            a.timestamp,
            &ColregsThresholds::default(),
            a.received_at,
        );

        assert!(encounter.record_final(&b).is_none());
        let later = state("2", 52.02, 0.0, 30);
        assert!(encounter.record_final(&later).is_some());
        assert_eq!(encounter.snapshots.len(), 3);
    }

    #[test]
    fn test_summary_end_time_only_when_closed() {
        let a = state("1", 52.0, 0.0, 0);
        let b = state("2", 52.01, 90.0, 5);
        let encounter = Encounter::open(
            VesselPair::new("1", "2"),
            1,
            (&a, &b),
            1_112.0,
            a.timestamp,
            &ColregsThresholds::default(),
            a.received_at,
        );

        assert_eq!(encounter.summary(None).end_time, None);
        let closed = encounter.summary(Some(CloseReason::Shutdown));
        assert_eq!(closed.end_time, Some(b.timestamp));
        assert_eq!(closed.close_reason, Some(CloseReason::Shutdown));
        assert_eq!(closed.snapshot_count, 2);
    }
}
