//! Client-side wait for the ledger's verdict on a presentation request.

use biolock_core::{Address, CredentialIssuedEvent, EventPosition};
use biolock_ledger::{LedgerEvent, LedgerSubscription};
use std::time::Duration;

use crate::verifier::{check_signature, VerificationOutcome};

/// What a client learns after waiting for `CredentialIssued`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// Biometrics matched and the credential was released.
    Issued {
        event: CredentialIssuedEvent,
        /// Whether the issuer's signature over the credential hash checks out.
        verification: VerificationOutcome,
    },
    /// Biometrics did not match.
    Denied,
    /// No verdict arrived in time. Not a denial.
    Unknown,
}

impl IssuanceOutcome {
    /// Issued with a signature from the recorded issuer.
    pub fn is_verified(&self) -> bool {
        matches!(self, IssuanceOutcome::Issued { verification, .. } if verification.is_verified())
    }
}

/// Watches ledger events for the result of one holder's requests.
pub struct IssuanceListener {
    subscription: LedgerSubscription,
}

impl IssuanceListener {
    pub fn new(subscription: LedgerSubscription) -> Self {
        Self { subscription }
    }

    /// Wait up to `timeout` for the `CredentialIssued` event answering the
    /// request of `(user, cred_id)` emitted at `request`. Verdicts logged
    /// before that request belong to earlier attempts and are skipped.
    /// Expiry yields [`IssuanceOutcome::Unknown`].
    pub async fn await_result(
        &mut self,
        user: Address,
        cred_id: &str,
        request: EventPosition,
        timeout: Duration,
    ) -> IssuanceOutcome {
        let wait = async {
            while let Some(positioned) = self.subscription.next().await {
                if positioned.position <= request {
                    continue;
                }
                let LedgerEvent::CredentialIssued(event) = positioned.event else {
                    continue;
                };
                if event.user != user || event.cred_id != cred_id {
                    continue;
                }
                return Some(event);
            }
            None
        };

        let event = match tokio::time::timeout(timeout, wait).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::warn!(user = %user, cred_id, "ledger subscription closed");
                return IssuanceOutcome::Unknown;
            }
            Err(_) => {
                tracing::info!(user = %user, cred_id, ?timeout, "no verdict before timeout");
                return IssuanceOutcome::Unknown;
            }
        };

        if !event.result {
            tracing::info!(user = %user, cred_id, "authentication denied");
            return IssuanceOutcome::Denied;
        }

        let verification = check_signature(&event.cred_hash, &event.signature, &event.issuer);
        tracing::info!(
            user = %user,
            cred_id,
            issuer = %event.issuer,
            verified = verification.is_verified(),
            "credential issued"
        );
        IssuanceOutcome::Issued {
            event,
            verification,
        }
    }
}
