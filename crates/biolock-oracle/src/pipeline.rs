//! Per-request evaluation: unwrap, recombine, decrypt, parse, match.
//!
//! Evaluation is a pure function of the event and the oracle's keys. Every
//! failure resolves fail-closed to `matched = false`; nothing here panics or
//! aborts the request.

use biolock_core::{
    AuthenticationRequestEvent, CoreError, FingerprintTemplate, RequestState, RequestStateMachine,
    RequestStep,
};
use biolock_crypto::{decrypt_str, KeyStore, SplitSecret};
use biolock_matcher::{MatchDecision, MatchingStrategy};

use crate::error::OracleError;

/// The verdict for one request and how far processing got.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub matched: bool,
    /// Last state reached before the result is submitted.
    pub reached: RequestState,
    /// Matcher output, when matching ran.
    pub decision: Option<MatchDecision>,
    /// Why processing stopped early.
    pub failure: Option<String>,
}

impl Evaluation {
    fn failed(reached: RequestState, error: OracleError) -> Self {
        Self {
            matched: false,
            reached,
            decision: None,
            failure: Some(error.to_string()),
        }
    }

    /// The step that takes this evaluation to `RESULT_SUBMITTED`.
    pub fn final_step(&self) -> RequestStep {
        if self.reached == RequestState::Matched {
            RequestStep::Submit
        } else {
            RequestStep::FailClosed
        }
    }
}

fn parse_template(plaintext: &str, role: &str) -> Result<FingerprintTemplate, OracleError> {
    FingerprintTemplate::from_json(plaintext).map_err(|e| match e {
        CoreError::TemplateParse(msg) => {
            CoreError::TemplateParse(format!("{} template: {}", role, msg)).into()
        }
        other => other.into(),
    })
}

fn advance(state: &mut RequestState, step: RequestStep) -> Result<(), OracleError> {
    *state = RequestStateMachine::transition(*state, step)?;
    Ok(())
}

/// Evaluate one authentication request.
pub fn evaluate(
    event: &AuthenticationRequestEvent,
    keys: &dyn KeyStore,
    matcher: &dyn MatchingStrategy,
) -> Evaluation {
    let mut state = RequestState::Idle;
    match run(event, keys, matcher, &mut state) {
        Ok(decision) => Evaluation {
            matched: decision.matched,
            reached: state,
            decision: Some(decision),
            failure: None,
        },
        Err(e) => {
            tracing::warn!(
                user = %event.user,
                cred_id = %event.cred_id,
                state = %state,
                error = %e,
                "request failed closed"
            );
            Evaluation::failed(state, e)
        }
    }
}

fn run(
    event: &AuthenticationRequestEvent,
    keys: &dyn KeyStore,
    matcher: &dyn MatchingStrategy,
    state: &mut RequestState,
) -> Result<MatchDecision, OracleError> {
    advance(state, RequestStep::Receive)?;

    let key = keys.unwrap(&event.wrapped_key)?;
    advance(state, RequestStep::UnwrapKey)?;

    let stored_blob = SplitSecret::from_parts(event.local_info.as_str(), event.stored_info.as_str())
        .recombine();
    advance(state, RequestStep::Recombine)?;

    let stored_plain = decrypt_str(&stored_blob, &key)?;
    let submitted_plain = decrypt_str(&event.submitted_info, &key)?;
    advance(state, RequestStep::Decrypt)?;

    let stored = parse_template(&stored_plain, "stored")?;
    let submitted = parse_template(&submitted_plain, "submitted")?;
    // The matcher accepts an empty stored template (0 >= ratio * 0), so an
    // empty enrollment is rejected here and the request is denied.
    if stored.is_empty() {
        return Err(CoreError::TemplateParse("stored template has no minutiae".into()).into());
    }
    advance(state, RequestStep::ParseTemplates)?;

    let decision = matcher.compare(&stored, &submitted);
    advance(state, RequestStep::Match)?;

    tracing::debug!(
        user = %event.user,
        cred_id = %event.cred_id,
        strategy = matcher.name(),
        matches = decision.matches,
        stored_points = decision.stored_points,
        matched = decision.matched,
        "request evaluated"
    );
    Ok(decision)
}
