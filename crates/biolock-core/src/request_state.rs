use std::fmt;

use crate::error::CoreError;

/// The stages an authentication request passes through inside the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RequestState {
    /// No request in progress.
    Idle,
    /// A request event has been accepted for processing.
    EventReceived,
    /// The symmetric key has been unwrapped with the oracle's private key.
    KeyUnwrapped,
    /// `localInfo + storedInfo` has been concatenated into the stored blob.
    SecretRecombined,
    /// Both the stored and the submitted blobs have been decrypted.
    Decrypted,
    /// Both plaintexts have been parsed as fingerprint templates.
    TemplatesParsed,
    /// The matcher produced a decision.
    Matched,
    /// The result has been handed to the ledger.
    ResultSubmitted,
}

impl RequestState {
    /// Whether a failure in this state resolves the request fail-closed.
    pub fn can_fail_closed(&self) -> bool {
        matches!(
            self,
            Self::EventReceived
                | Self::KeyUnwrapped
                | Self::SecretRecombined
                | Self::Decrypted
                | Self::TemplatesParsed
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::EventReceived => write!(f, "EVENT_RECEIVED"),
            Self::KeyUnwrapped => write!(f, "KEY_UNWRAPPED"),
            Self::SecretRecombined => write!(f, "SECRET_RECOMBINED"),
            Self::Decrypted => write!(f, "DECRYPTED"),
            Self::TemplatesParsed => write!(f, "TEMPLATES_PARSED"),
            Self::Matched => write!(f, "MATCHED"),
            Self::ResultSubmitted => write!(f, "RESULT_SUBMITTED"),
        }
    }
}

/// Steps that drive a request between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStep {
    Receive,
    UnwrapKey,
    Recombine,
    Decrypt,
    ParseTemplates,
    Match,
    Submit,
    /// A cryptographic or parsing failure; the request resolves with
    /// `matched = false`.
    FailClosed,
    Reset,
}

/// Transition table for oracle requests.
///
/// Valid transitions:
/// - Idle → EventReceived (Receive)
/// - EventReceived → KeyUnwrapped (UnwrapKey)
/// - KeyUnwrapped → SecretRecombined (Recombine)
/// - SecretRecombined → Decrypted (Decrypt)
/// - Decrypted → TemplatesParsed (ParseTemplates)
/// - TemplatesParsed → Matched (Match)
/// - Matched → ResultSubmitted (Submit)
/// - EventReceived..=TemplatesParsed → ResultSubmitted (FailClosed)
/// - ResultSubmitted → Idle (Reset)
pub struct RequestStateMachine;

impl RequestStateMachine {
    pub fn transition(current: RequestState, step: RequestStep) -> Result<RequestState, CoreError> {
        use RequestState as S;
        use RequestStep as E;

        let next = match (current, step) {
            (S::Idle, E::Receive) => S::EventReceived,
            (S::EventReceived, E::UnwrapKey) => S::KeyUnwrapped,
            (S::KeyUnwrapped, E::Recombine) => S::SecretRecombined,
            (S::SecretRecombined, E::Decrypt) => S::Decrypted,
            (S::Decrypted, E::ParseTemplates) => S::TemplatesParsed,
            (S::TemplatesParsed, E::Match) => S::Matched,
            (S::Matched, E::Submit) => S::ResultSubmitted,
            (s, E::FailClosed) if s.can_fail_closed() => S::ResultSubmitted,
            (S::ResultSubmitted, E::Reset) => S::Idle,
            _ => {
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    step,
                })
            }
        };

        tracing::trace!(from = %current, to = %next, step = ?step, "request state transition");

        Ok(next)
    }

    pub fn can_transition(current: RequestState, step: RequestStep) -> bool {
        Self::transition(current, step).is_ok()
    }
}
