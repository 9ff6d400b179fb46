//! Holder-side helpers: enrolling a template and building presentation
//! requests for the oracle.

use biolock_core::{Address, EventPosition, FingerprintTemplate};
use biolock_crypto::{encrypt, wrap_symmetric_key, EncryptedBlob, SplitSecret, SymmetricKey};
use biolock_ledger::InMemoryLedger;
use rsa::RsaPublicKey;

use crate::error::CredentialError;

/// Result of enrolling a fingerprint template.
///
/// `split.remote` is registered on the ledger; `split.local` and `key` stay
/// with the holder.
#[derive(Debug, Clone)]
pub struct BiometricEnrollment {
    pub key: SymmetricKey,
    pub blob: EncryptedBlob,
    pub split: SplitSecret,
}

impl BiometricEnrollment {
    /// Encrypt `template` under a fresh key and split the blob in two.
    pub fn enroll(template: &FingerprintTemplate) -> Result<Self, CredentialError> {
        if template.is_empty() {
            return Err(CredentialError::EnrollmentFailed(
                "template has no minutiae".into(),
            ));
        }
        let key = SymmetricKey::generate();
        let blob = encrypt(template.to_json()?.as_bytes(), &key)?;
        let split = SplitSecret::split(&blob.to_string());
        tracing::debug!(
            points = template.len(),
            local_len = split.local.len(),
            remote_len = split.remote.len(),
            "template enrolled"
        );
        Ok(Self { key, blob, split })
    }

    /// Register the holder's DID with the ledger-visible half.
    pub fn register(
        &self,
        ledger: &InMemoryLedger,
        holder: Address,
        did: &str,
    ) -> Result<(), CredentialError> {
        ledger.register(holder, did, &self.split.remote)?;
        Ok(())
    }
}

/// Arguments of `requestCredential`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequestArgs {
    pub user: Address,
    pub cred_id: String,
    pub submitted_info: String,
    pub local_info: String,
    pub wrapped_key: String,
}

impl AuthenticationRequestArgs {
    pub fn submit(&self, ledger: &InMemoryLedger) -> Result<EventPosition, CredentialError> {
        Ok(ledger.request_credential(
            self.user,
            &self.cred_id,
            &self.submitted_info,
            &self.local_info,
            &self.wrapped_key,
        )?)
    }
}

/// Encrypts a fresh capture with the enrollment key and wraps that key for
/// the oracle.
pub struct AuthenticationRequestBuilder<'a> {
    enrollment: &'a BiometricEnrollment,
    oracle_public_key: &'a RsaPublicKey,
}

impl<'a> AuthenticationRequestBuilder<'a> {
    pub fn new(enrollment: &'a BiometricEnrollment, oracle_public_key: &'a RsaPublicKey) -> Self {
        Self {
            enrollment,
            oracle_public_key,
        }
    }

    pub fn build(
        &self,
        user: Address,
        cred_id: &str,
        capture: &FingerprintTemplate,
    ) -> Result<AuthenticationRequestArgs, CredentialError> {
        let submitted = encrypt(capture.to_json()?.as_bytes(), &self.enrollment.key)?;
        let wrapped = wrap_symmetric_key(&self.enrollment.key, self.oracle_public_key)?;
        Ok(AuthenticationRequestArgs {
            user,
            cred_id: cred_id.to_string(),
            submitted_info: submitted.to_string(),
            local_info: self.enrollment.split.local.clone(),
            wrapped_key: wrapped.into_string(),
        })
    }
}
