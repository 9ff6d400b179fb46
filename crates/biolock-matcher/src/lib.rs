//! Biolock Matcher: pure, deterministic comparison of fingerprint templates.

pub mod error;
pub mod greedy;
pub mod strategy;

pub use error::MatchError;
pub use greedy::GreedyMatcher;
pub use strategy::{MatchDecision, MatchParameters, MatchingStrategy};

use biolock_core::FingerprintTemplate;

/// Match `submitted` against `stored` with the default greedy strategy and
/// parameters.
pub fn match_fingerprints(stored: &FingerprintTemplate, submitted: &FingerprintTemplate) -> bool {
    GreedyMatcher::default().compare(stored, submitted).matched
}
