//! Encounter detection settings

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::geometry::{ColregsThresholds, NAUTICAL_MILE};

/// Longest accepted vessel timeout or encounter duration, ten years
pub const MAX_PERIOD_S: u64 = 10 * 365 * 24 * 3600;

/// Thresholds that drive the encounter lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterSettings {
    /// Start an encounter when two moving vessels come closer than this
    pub start_distance_nm: f64,
    /// End an encounter once the vessels are further apart than this
    pub end_distance_nm: f64,
    /// Vessels slower than this (knots) never start an encounter
    pub min_speed_kn: f64,
    /// Drop a vessel from tracking after this many seconds without a report
    pub vessel_timeout_s: u64,
    /// Close any encounter that has been open this long
    pub max_duration_s: u64,
    /// Angular boundaries for head-on / crossing / overtaking
    pub colregs: ColregsThresholds,
}

impl Default for EncounterSettings {
    fn default() -> Self {
        Self {
            start_distance_nm: 3.0,
            end_distance_nm: 5.0,
            min_speed_kn: 0.5,
            vessel_timeout_s: 300,
            max_duration_s: 3600,
            colregs: ColregsThresholds::default(),
        }
    }
}

impl EncounterSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.start_distance_nm.is_finite() && self.start_distance_nm > 0.0) {
            return Err(SettingsError::invalid(
                "start_distance_nm",
                format!("must be positive, got {}", self.start_distance_nm),
            ));
        }
        if !(self.end_distance_nm.is_finite() && self.end_distance_nm > self.start_distance_nm) {
            return Err(SettingsError::invalid(
                "end_distance_nm",
                format!(
                    "must be greater than start_distance_nm ({}), got {}",
                    self.start_distance_nm, self.end_distance_nm
                ),
            ));
        }
        if !(self.min_speed_kn.is_finite() && self.min_speed_kn >= 0.0) {
            return Err(SettingsError::invalid(
                "min_speed_kn",
                format!("must not be negative, got {}", self.min_speed_kn),
            ));
        }
        check_period("vessel_timeout_s", self.vessel_timeout_s)?;
        check_period("max_duration_s", self.max_duration_s)?;
        let c = &self.colregs;
        if !(0.0..=180.0).contains(&c.overtaking_max_deg)
            || !(0.0..=180.0).contains(&c.head_on_min_deg)
            || c.overtaking_max_deg >= c.head_on_min_deg
        {
            return Err(SettingsError::invalid(
                "colregs",
                format!(
                    "need 0 <= overtaking_max_deg ({}) < head_on_min_deg ({}) <= 180",
                    c.overtaking_max_deg, c.head_on_min_deg
                ),
            ));
        }
        Ok(())
    }

    pub fn start_distance_m(&self) -> f64 {
        self.start_distance_nm * NAUTICAL_MILE
    }

    pub fn end_distance_m(&self) -> f64 {
        self.end_distance_nm * NAUTICAL_MILE
    }

    pub fn vessel_timeout(&self) -> TimeDelta {
        period(self.vessel_timeout_s)
    }

    pub fn max_duration(&self) -> TimeDelta {
        period(self.max_duration_s)
    }
}

fn check_period(field: &'static str, seconds: u64) -> Result<(), SettingsError> {
    if seconds == 0 {
        return Err(SettingsError::invalid(field, "must be non-zero"));
    }
    if seconds > MAX_PERIOD_S {
        return Err(SettingsError::invalid(
            field,
            format!("must be at most {} s, got {}", MAX_PERIOD_S, seconds),
        ));
    }
    Ok(())
}

/// Clamped to `MAX_PERIOD_S` so unvalidated settings cannot overflow
fn period(seconds: u64) -> TimeDelta {
    TimeDelta::seconds(seconds.min(MAX_PERIOD_S) as i64)
}
