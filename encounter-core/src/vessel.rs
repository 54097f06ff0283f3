//! Vessel reports and kinematic state

use chrono::{DateTime, Utc};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::geometry::{self, GeoPoint};

/// Highest speed over ground AIS can express; 102.3 means "not available"
pub const MAX_SOG_KN: f64 = 102.2;

/// Kinematic report for one vessel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub mmsi: String,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground in knots
    pub sog: f64,
    /// Course over ground in degrees (0-360)
    pub cog: f64,
    /// True heading in degrees, `None` when the transponder does not report it
    pub heading: Option<f64>,
    /// Ship name carried in the message metadata, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PositionReport {
    /// Check the report against the physically possible ranges
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.mmsi.trim().is_empty() {
            return Err(ReportError::EmptyIdentity);
        }
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ReportError::InvalidLatitude {
                mmsi: self.mmsi.clone(),
                lat: self.lat,
            });
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(ReportError::InvalidLongitude {
                mmsi: self.mmsi.clone(),
                lon: self.lon,
            });
        }
        if !self.sog.is_finite() || !(0.0..=MAX_SOG_KN).contains(&self.sog) {
            return Err(ReportError::InvalidSpeed {
                mmsi: self.mmsi.clone(),
                sog: self.sog,
            });
        }
        if !self.cog.is_finite() || !(0.0..360.0).contains(&self.cog) {
            return Err(ReportError::InvalidCourse {
                mmsi: self.mmsi.clone(),
                cog: self.cog,
            });
        }
        Ok(())
    }
}

/// Static voyage data for one vessel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticReport {
    pub mmsi: String,
    pub name: Option<String>,
    pub ship_type: Option<u8>,
    /// Overall length in meters
    pub length: Option<f64>,
    /// Overall beam in meters
    pub width: Option<f64>,
}

/// One inbound event from the AIS stream
#[derive(Debug, Clone, PartialEq)]
pub enum AisEvent {
    Position(PositionReport),
    Static(StaticReport),
}

/// Last known kinematic state of a tracked vessel
#[derive(Debug, Clone, PartialEq)]
pub struct VesselState {
    pub mmsi: String,
    pub position: GeoPoint,
    pub sog: f64,
    pub cog: f64,
    pub heading: Option<f64>,
    /// Time stamped on the report
    pub timestamp: DateTime<Utc>,
    /// Clock time the report was accepted, drives staleness
    pub received_at: DateTime<Utc>,
}

impl VesselState {
    /// Build tracked state from a validated report
    pub fn from_report(report: &PositionReport, received_at: DateTime<Utc>) -> Self {
        VesselState {
            mmsi: report.mmsi.clone(),
            position: GeoPoint::new(report.lat, report.lon),
            sog: report.sog,
            cog: report.cog,
            // Heading is metadata only; drop values AIS uses as "not available"
            heading: report.heading.filter(|h| (0.0..360.0).contains(h)),
            timestamp: report.timestamp,
            received_at,
        }
    }

    /// Moving fast enough to start an encounter
    pub fn is_moving(&self, min_speed_kn: f64) -> bool {
        self.sog >= min_speed_kn
    }

    /// Velocity (east, north) in m/s, from course over ground
    pub fn velocity(&self) -> Vector2<f64> {
        geometry::velocity(self.sog, self.cog)
    }
}
