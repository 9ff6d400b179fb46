use crate::request_state::{RequestState, RequestStep};

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid request transition from {from} on {step:?}")]
    InvalidStateTransition { from: RequestState, step: RequestStep },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("template parse error: {0}")]
    TemplateParse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}
