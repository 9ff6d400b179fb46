/// Matcher configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("distance threshold must be finite and non-negative, got {0}")]
    InvalidDistanceThreshold(f64),

    #[error("orientation tolerance must be finite and non-negative, got {0}")]
    InvalidOrientationTolerance(f64),

    #[error("match ratio must be within [0, 1], got {0}")]
    InvalidMatchRatio(f64),
}
