//! Events emitted by the ledger, tagged with their log position.

use biolock_core::{AuthenticationRequestEvent, CredentialIssuedEvent, EventPosition};
use serde::{Deserialize, Serialize};

/// Events emitted by the credential registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "args")]
pub enum LedgerEvent {
    AuthenticationRequest(AuthenticationRequestEvent),
    CredentialIssued(CredentialIssuedEvent),
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::AuthenticationRequest(_) => "AuthenticationRequest",
            LedgerEvent::CredentialIssued(_) => "CredentialIssued",
        }
    }
}

/// A ledger event and where it sits in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionedEvent {
    pub position: EventPosition,
    pub event: LedgerEvent,
}

/// An authentication request as delivered to the oracle by a ledger bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub position: EventPosition,
    pub request: AuthenticationRequestEvent,
}

impl RequestEnvelope {
    pub fn new(position: EventPosition, request: AuthenticationRequestEvent) -> Self {
        Self { position, request }
    }
}

impl PositionedEvent {
    /// The request envelope, if this is an `AuthenticationRequest`.
    pub fn as_request(&self) -> Option<RequestEnvelope> {
        match &self.event {
            LedgerEvent::AuthenticationRequest(request) => {
                Some(RequestEnvelope::new(self.position, request.clone()))
            }
            _ => None,
        }
    }
}
