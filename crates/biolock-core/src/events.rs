//! Ledger event payloads exchanged between the registry, the oracle and
//! client-side listeners.

use serde::{Deserialize, Serialize};

use crate::types::{Address, RequestKey};

/// Emitted by the credential registry when a holder asks to present a
/// credential. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequestEvent {
    pub user: Address,
    pub cred_id: String,
    /// Freshly captured template, encrypted as an `ivHex:cipherHex` blob.
    pub submitted_info: String,
    /// Ledger-visible half of the enrolled blob.
    pub stored_info: String,
    /// Holder-local half of the enrolled blob.
    pub local_info: String,
    /// Base64 RSA-OAEP wrapped symmetric key.
    pub wrapped_key: String,
}

impl AuthenticationRequestEvent {
    /// Idempotency key for this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.user, self.cred_id.clone())
    }
}

/// The oracle's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    pub user: Address,
    pub cred_id: String,
    pub matched: bool,
}

impl AuthenticationResult {
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.user, self.cred_id.clone())
    }
}

/// Emitted by the registry once an authentication result has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialIssuedEvent {
    pub user: Address,
    pub cred_id: String,
    pub issuer: Address,
    pub holder: Address,
    pub cred_hash: String,
    /// Serialized recoverable signature (JSON).
    pub signature: String,
    /// Whether biometric authentication succeeded.
    pub result: bool,
}
