//! Output records handed to persistence
//!
//! Every record names the table it belongs to and carries a natural key, so
//! a store can upsert and a retried batch does not duplicate rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encounter::EncounterId;
use crate::geometry::EncounterType;
use crate::vessel::VesselState;

/// Destination table of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Vessels,
    Positions,
    Encounters,
    EncounterPositions,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Vessels => "vessels",
            Table::Positions => "positions",
            Table::Encounters => "encounters",
            Table::EncounterPositions => "encounter_positions",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static vessel data; `None` fields leave the stored value untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRecord {
    pub mmsi: String,
    pub name: Option<String>,
    pub ship_type: Option<u8>,
    pub length: Option<f64>,
    pub width: Option<f64>,
}

/// Plain kinematic snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub mmsi: String,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub sog: f64,
    pub cog: f64,
    pub heading: Option<f64>,
}

impl From<&VesselState> for PositionRecord {
    fn from(state: &VesselState) -> Self {
        PositionRecord {
            mmsi: state.mmsi.clone(),
            timestamp: state.timestamp,
            lat: state.position.lat,
            lon: state.position.lon,
            sog: state.sog,
            cog: state.cog,
            heading: state.heading,
        }
    }
}

/// Kinematic snapshot recorded while an encounter was open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterPositionRecord {
    pub encounter_id: EncounterId,
    #[serde(flatten)]
    pub position: PositionRecord,
}

/// Why an encounter was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Separation exceeded the end distance
    Distance,
    /// One of the vessels stopped reporting
    VesselTimeout,
    /// Open longer than the maximum duration
    MaxDuration,
    /// Collector shut down
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Distance => write!(f, "distance"),
            CloseReason::VesselTimeout => write!(f, "vessel timeout"),
            CloseReason::MaxDuration => write!(f, "max duration"),
            CloseReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Encounter summary; written at start and again, with `end_time`, at close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterRecord {
    pub id: EncounterId,
    pub vessel_a: String,
    pub vessel_b: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_distance_m: f64,
    pub min_distance_time: DateTime<Utc>,
    pub cpa_m: f64,
    pub tcpa_s: f64,
    pub encounter_type: EncounterType,
    pub relative_bearing: f64,
    pub close_reason: Option<CloseReason>,
    pub snapshot_count: usize,
}

/// A queued write, tagged with its table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table")]
pub enum Record {
    #[serde(rename = "vessels")]
    Vessel(VesselRecord),
    #[serde(rename = "positions")]
    Position(PositionRecord),
    #[serde(rename = "encounters")]
    Encounter(EncounterRecord),
    #[serde(rename = "encounter_positions")]
    EncounterPosition(EncounterPositionRecord),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Vessel(_) => Table::Vessels,
            Record::Position(_) => Table::Positions,
            Record::Encounter(_) => Table::Encounters,
            Record::EncounterPosition(_) => Table::EncounterPositions,
        }
    }

    /// Natural key a store can upsert on
    pub fn key(&self) -> String {
        match self {
            Record::Vessel(v) => v.mmsi.clone(),
            Record::Position(p) => format!("{}@{}", p.mmsi, p.timestamp.timestamp_millis()),
            Record::Encounter(e) => e.id.to_string(),
            Record::EncounterPosition(ep) => format!(
                "{}/{}@{}",
                ep.encounter_id,
                ep.position.mmsi,
                ep.position.timestamp.timestamp_millis()
            ),
        }
    }
}
