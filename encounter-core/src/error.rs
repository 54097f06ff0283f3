//! Error types for report validation and settings

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons a kinematic or static report is dropped before it touches any state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    /// Report carries no vessel identity
    #[error("Report has an empty vessel identity")]
    EmptyIdentity,

    /// Latitude outside [-90, 90] or not a number (AIS uses 91 for "not available")
    #[error("Invalid latitude {lat} for vessel {mmsi}")]
    InvalidLatitude { mmsi: String, lat: f64 },

    /// Longitude outside [-180, 180] or not a number (AIS uses 181 for "not available")
    #[error("Invalid longitude {lon} for vessel {mmsi}")]
    InvalidLongitude { mmsi: String, lon: f64 },

    /// Speed over ground negative, not a number, or above the AIS maximum
    #[error("Invalid speed over ground {sog} kn for vessel {mmsi}")]
    InvalidSpeed { mmsi: String, sog: f64 },

    /// Course over ground outside [0, 360)
    #[error("Invalid course over ground {cog} for vessel {mmsi}")]
    InvalidCourse { mmsi: String, cog: f64 },

    /// Report is older than the state already tracked for this vessel
    #[error("Out-of-order report for vessel {mmsi}: {timestamp} is older than {tracked}")]
    OutOfOrder {
        mmsi: String,
        timestamp: DateTime<Utc>,
        tracked: DateTime<Utc>,
    },
}

impl ReportError {
    /// Out-of-order reports are routine on a merged AIS feed and not worth a warning
    pub fn is_routine(&self) -> bool {
        matches!(self, ReportError::OutOfOrder { .. })
    }
}

/// Errors found when validating encounter settings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SettingsError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
