//! Greedy first-match minutiae comparison.
//!
//! Each stored minutia is paired with the first submitted minutia that has
//! the same type, an orientation within tolerance and lies within the
//! distance threshold. Submitted minutiae are not consumed, so one of them
//! may satisfy several stored ones. The result is therefore not symmetric in
//! its arguments.

use biolock_core::{FingerprintTemplate, MinutiaPoint};

use crate::error::MatchError;
use crate::strategy::{MatchDecision, MatchParameters, MatchingStrategy};

#[derive(Debug, Clone, Default)]
pub struct GreedyMatcher {
    params: MatchParameters,
}

impl GreedyMatcher {
    pub fn new(params: MatchParameters) -> Result<Self, MatchError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn with_distance_threshold(distance_threshold: f64) -> Result<Self, MatchError> {
        Ok(Self {
            params: MatchParameters::with_distance_threshold(distance_threshold)?,
        })
    }

    pub fn params(&self) -> &MatchParameters {
        &self.params
    }

    fn pairs(&self, a: &MinutiaPoint, b: &MinutiaPoint) -> bool {
        a.kind == b.kind
            && (a.orientation - b.orientation).abs() <= self.params.orientation_tolerance
            && a.distance(b) <= self.params.distance_threshold
    }
}

impl MatchingStrategy for GreedyMatcher {
    fn compare(
        &self,
        stored: &FingerprintTemplate,
        submitted: &FingerprintTemplate,
    ) -> MatchDecision {
        let matches = stored
            .minutiae_points
            .iter()
            .filter(|a| submitted.minutiae_points.iter().any(|b| self.pairs(a, b)))
            .count();

        let required = self.params.match_ratio * stored.len() as f64;
        let matched = matches as f64 >= required;

        tracing::debug!(
            strategy = self.name(),
            matches,
            required,
            stored_points = stored.len(),
            submitted_points = submitted.len(),
            matched,
            "compared fingerprint templates"
        );

        MatchDecision {
            matched,
            matches,
            required,
            stored_points: stored.len(),
            submitted_points: submitted.len(),
        }
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}
