use biolock_core::FingerprintTemplate;
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Default maximum Euclidean distance between paired minutiae.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 5.0;
/// Maximum orientation difference, in degrees, between paired minutiae.
pub const ORIENTATION_TOLERANCE: f64 = 10.0;
/// Fraction of stored minutiae that must find a partner.
pub const DEFAULT_MATCH_RATIO: f64 = 0.7;

/// Tunables shared by matching strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchParameters {
    pub distance_threshold: f64,
    pub orientation_tolerance: f64,
    pub match_ratio: f64,
}

impl MatchParameters {
    /// Parameters with a custom distance threshold and the fixed orientation
    /// tolerance and ratio.
    pub fn with_distance_threshold(distance_threshold: f64) -> Result<Self, MatchError> {
        let params = Self {
            distance_threshold,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(MatchError::InvalidDistanceThreshold(self.distance_threshold));
        }
        if !self.orientation_tolerance.is_finite() || self.orientation_tolerance < 0.0 {
            return Err(MatchError::InvalidOrientationTolerance(
                self.orientation_tolerance,
            ));
        }
        if !(0.0..=1.0).contains(&self.match_ratio) {
            return Err(MatchError::InvalidMatchRatio(self.match_ratio));
        }
        Ok(())
    }
}

impl Default for MatchParameters {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            orientation_tolerance: ORIENTATION_TOLERANCE,
            match_ratio: DEFAULT_MATCH_RATIO,
        }
    }
}

/// Outcome of comparing two templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub matched: bool,
    /// Number of stored minutiae that found a partner.
    pub matches: usize,
    /// Minimum number of partners required, `match_ratio * |stored|`.
    pub required: f64,
    pub stored_points: usize,
    pub submitted_points: usize,
}

/// A way of deciding whether a submitted template matches a stored one.
///
/// Implementations must be pure and deterministic. Roles are not
/// interchangeable: `stored` defines the denominator of the decision.
pub trait MatchingStrategy: Send + Sync {
    fn compare(&self, stored: &FingerprintTemplate, submitted: &FingerprintTemplate)
        -> MatchDecision;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let p = MatchParameters::default();
        assert_eq!(p.distance_threshold, 5.0);
        assert_eq!(p.orientation_tolerance, 10.0);
        assert_eq!(p.match_ratio, 0.7);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_custom_threshold() {
        let p = MatchParameters::with_distance_threshold(8.0).unwrap();
        assert_eq!(p.distance_threshold, 8.0);
        assert_eq!(p.orientation_tolerance, ORIENTATION_TOLERANCE);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(MatchParameters::with_distance_threshold(-1.0).is_err());
        assert!(MatchParameters::with_distance_threshold(f64::NAN).is_err());
        let p = MatchParameters {
            match_ratio: 1.5,
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(MatchError::InvalidMatchRatio(_))));
    }
}
