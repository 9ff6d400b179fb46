//! Biolock Core: Fundamental types, errors, and the oracle request
//! state machine shared by every Biolock crate.

pub mod error;
pub mod events;
pub mod request_state;
pub mod types;

pub use error::CoreError;
pub use events::{AuthenticationRequestEvent, AuthenticationResult, CredentialIssuedEvent};
pub use request_state::{RequestState, RequestStateMachine, RequestStep};
pub use types::{
    Address, Credential, EventPosition, FingerprintTemplate, MinutiaPoint, RequestKey,
};
