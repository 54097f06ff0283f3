//! COLREGS encounter classification
//!
//! Reduces the right-of-way rules to three situations based on how far the
//! two courses diverge:
//!
//! ```text
//!  divergence   0°........15°.................170°........180°
//!               overtaking |      crossing      |  head-on
//! ```
//!
//! The boundaries live in [`ColregsThresholds`]; defaults are 15° and 170°.

use serde::{Deserialize, Serialize};

use super::normalize_degrees;

/// Right-of-way situation between two vessels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterType {
    HeadOn,
    Crossing,
    Overtaking,
}

impl EncounterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterType::HeadOn => "head-on",
            EncounterType::Crossing => "crossing",
            EncounterType::Overtaking => "overtaking",
        }
    }
}

impl std::fmt::Display for EncounterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Angular boundaries between the three situations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColregsThresholds {
    /// Divergence at or below this is overtaking
    pub overtaking_max_deg: f64,
    /// Divergence at or above this is head-on
    pub head_on_min_deg: f64,
}

impl Default for ColregsThresholds {
    fn default() -> Self {
        Self {
            overtaking_max_deg: 15.0,
            head_on_min_deg: 170.0,
        }
    }
}

/// Outcome of classifying an encounter at its start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub encounter_type: EncounterType,
    /// Bearing of B relative to A's bow, degrees (0-360, clockwise)
    pub relative_bearing: f64,
}

/// Smallest angle between two courses, 0-180 degrees
pub fn course_divergence(course_a: f64, course_b: f64) -> f64 {
    let diff = normalize_degrees(course_a - course_b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Classify the situation between A and B
///
/// `bearing_from_a` is the true bearing from A to B, used to report where B
/// sits relative to A's bow. The situation itself follows from the course
/// divergence and is symmetric in A and B.
pub fn classify_encounter(
    bearing_from_a: f64,
    course_a: f64,
    course_b: f64,
    thresholds: &ColregsThresholds,
) -> Classification {
    let divergence = course_divergence(course_a, course_b);

    let encounter_type = if divergence >= thresholds.head_on_min_deg {
        EncounterType::HeadOn
    } else if divergence <= thresholds.overtaking_max_deg {
        EncounterType::Overtaking
    } else {
        EncounterType::Crossing
    };

    Classification {
        encounter_type,
        relative_bearing: normalize_degrees(bearing_from_a - course_a),
    }
}
