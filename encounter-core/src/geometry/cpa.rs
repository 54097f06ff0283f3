//! CPA/TCPA Calculation
//!
//! Computes Closest Point of Approach (CPA) and Time to CPA (TCPA)
//! between two vessels moving at constant velocity.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Below this squared relative speed (m²/s²) the vessels are treated as
/// keeping station relative to each other
const MIN_RELATIVE_SPEED_SQ: f64 = 1e-6;

/// Result of CPA/TCPA calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpaResult {
    /// Closest Point of Approach in meters
    pub cpa_m: f64,
    /// Time to Closest Point of Approach in seconds
    /// Positive = future, Negative = past
    pub tcpa_s: f64,
    /// Separation at the time of calculation in meters
    pub range_m: f64,
}

impl CpaResult {
    /// Closest approach already happened, vessels are opening
    pub fn is_diverging(&self) -> bool {
        self.tcpa_s < 0.0
    }

    /// Closest separation from now on
    pub fn forward_cpa_m(&self) -> f64 {
        if self.is_diverging() {
            self.range_m
        } else {
            self.cpa_m
        }
    }
}

/// Calculate CPA and TCPA between vessel A and vessel B
///
/// Uses relative velocity method:
/// 1. Compute relative position r = B - A
/// 2. Compute relative velocity v = vB - vA
/// 3. Find time when |r + t·v| is minimized: t = -(r · v) / |v|²
///
/// Positions are meters in a shared local frame, velocities m/s.
/// TCPA is never clamped: a negative value means the vessels are diverging.
pub fn closest_approach(
    pos_a: Vector2<f64>,
    vel_a: Vector2<f64>,
    pos_b: Vector2<f64>,
    vel_b: Vector2<f64>,
) -> CpaResult {
    let r = pos_b - pos_a;
    let v = vel_b - vel_a;
    let range_m = r.norm();

    let v_sq = v.norm_squared();
    if v_sq < MIN_RELATIVE_SPEED_SQ {
        // Same course and speed, separation never changes
        return CpaResult {
            cpa_m: range_m,
            tcpa_s: 0.0,
            range_m,
        };
    }

    let tcpa_s = -r.dot(&v) / v_sq;
    let cpa_m = (r + v * tcpa_s).norm();

    CpaResult {
        cpa_m,
        tcpa_s,
        range_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{velocity, GeoPoint, LocalFrame, KN_TO_MS};

    fn cpa_between(a: (f64, f64, f64, f64), b: (f64, f64, f64, f64)) -> CpaResult {
        let pa = GeoPoint::new(a.0, a.1);
        let pb = GeoPoint::new(b.0, b.1);
        let frame = LocalFrame::for_pair(pa, pb);
        closest_approach(
            frame.project(pa),
            velocity(a.2, a.3),
            frame.project(pb),
            velocity(b.2, b.3),
        )
    }

    #[test]
    fn test_head_on_collision() {
        // A heading north at 10 kn, B ~5.5 km north heading south at 10 kn
        let result = cpa_between((52.0, 4.0, 10.0, 0.0), (52.05, 4.0, 10.0, 180.0));

        assert!(result.cpa_m < 1.0);
        assert!(result.tcpa_s > 0.0);
        // ~5556 m closed at 20 kn
        let expected = result.range_m / (20.0 * KN_TO_MS);
        assert!((result.tcpa_s - expected).abs() < 1.0);
    }

    #[test]
    fn test_parallel_course() {
        // Same course and speed, ~700 m abeam
        let result = cpa_between((52.0, 4.0, 10.0, 0.0), (52.0, 4.01, 10.0, 0.0));

        assert_eq!(result.tcpa_s, 0.0);
        assert!((result.cpa_m - result.range_m).abs() < 1e-9);
    }

    #[test]
    fn test_stationary_vessels() {
        let result = cpa_between((52.0, 4.0, 0.0, 0.0), (52.01, 4.01, 0.0, 0.0));

        assert_eq!(result.tcpa_s, 0.0);
        assert_eq!(result.cpa_m, result.range_m);
    }

    #[test]
    fn test_overtaking_on_same_track() {
        // A at 15 kn closing on B at 10 kn ~555 m ahead
        let result = cpa_between((52.0, 4.0, 15.0, 0.0), (52.005, 4.0, 10.0, 0.0));

        assert!(result.cpa_m < 1.0);
        assert!(result.tcpa_s > 0.0);
    }

    #[test]
    fn test_perpendicular_miss() {
        // A north, B ~1.4 km east heading west, same speed
        let result = cpa_between((52.0, 4.0, 10.0, 0.0), (52.0, 4.02, 10.0, 270.0));

        assert!(result.cpa_m > 0.0);
        assert!(result.cpa_m < result.range_m);
        assert!(result.tcpa_s > 0.0);
    }

    #[test]
    fn test_diverging_vessels() {
        // A heading south, B ~1.1 km north heading north
        let result = cpa_between((52.0, 4.0, 10.0, 180.0), (52.01, 4.0, 10.0, 0.0));

        // The closest approach was in the past and is reported as such
        assert!(result.tcpa_s < 0.0);
        assert!(result.is_diverging());
        assert!(result.cpa_m < 1.0);
        // From now on the vessels never get closer than they are
        assert!(result.forward_cpa_m() >= result.range_m);
    }

    #[test]
    fn test_direct_vectors() {
        // Target at (0, 1000) closing at 15 m/s
        let result = closest_approach(
            Vector2::new(0.0, 0.0),
            Vector2::new(0.0, 10.0),
            Vector2::new(0.0, 1000.0),
            Vector2::new(0.0, -5.0),
        );
        assert!((result.tcpa_s - 66.67).abs() < 0.01);
        assert!(result.cpa_m < 1e-9);
        assert_eq!(result.range_m, 1000.0);
    }
}
