//! # Encounter Core
//!
//! Platform-independent vessel encounter detection for AIS traffic.
//!
//! This crate contains the pure detection logic with **zero I/O dependencies**:
//! it takes decoded position and static reports, tracks every vessel, and
//! emits the records a persistence layer has to write.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  encounter-core (no tokio/async deps)                       │
//! │  ├── geometry/   (distance, bearing, CPA/TCPA, COLREGS)     │
//! │  ├── tracking    (last known state per vessel)              │
//! │  ├── encounter/  (episode lifecycle, EncounterEngine)       │
//! │  ├── records     (rows for the four output tables)          │
//! │  └── Clock       (injected time source)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  encounter-server       │
//!                 │  (buffer, stores, CLI)  │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Key Modules
//!
//! - [`geometry`] - Great-circle math, closest point of approach, COLREGS classification
//! - [`tracking`] - Vessel table with staleness expiry
//! - [`encounter`] - Encounter episodes and the [`EncounterEngine`]
//! - [`records`] - Output records and their natural keys
//! - [`clock`] - [`Clock`] trait with system and manual implementations
//!
//! ## Example: Detecting an Encounter
//!
//! ```rust
//! use chrono::Utc;
//! use encounter_core::{EncounterEngine, EncounterSettings, PositionReport, Record};
//!
//! let mut engine = EncounterEngine::with_system_clock(EncounterSettings::default()).unwrap();
//! let report = |mmsi: &str, lat: f64, cog: f64| PositionReport {
//!     mmsi: mmsi.to_string(),
//!     timestamp: Utc::now(),
//!     lat,
//!     lon: 4.0,
//!     sog: 12.0,
//!     cog,
//!     heading: None,
//!     name: None,
//! };
//!
//! engine.process_position(report("244000001", 52.00, 0.0)).unwrap();
//! let records = engine.process_position(report("244000002", 52.03, 180.0)).unwrap();
//!
//! assert!(records.iter().any(|r| matches!(r, Record::Encounter(_))));
//! assert_eq!(engine.stats().open_encounters, 1);
//! ```

pub mod clock;
pub mod encounter;
pub mod error;
pub mod geometry;
pub mod records;
pub mod settings;
pub mod tracking;
pub mod vessel;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use encounter::{Encounter, EncounterEngine, EncounterId, EngineStats, VesselPair};
pub use error::{ReportError, SettingsError};
pub use geometry::{CpaResult, EncounterType, GeoPoint};
pub use records::{CloseReason, Record, Table};
pub use settings::EncounterSettings;
pub use tracking::VesselTable;
pub use vessel::{AisEvent, PositionReport, StaticReport, VesselState};
