/// Credential system errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("issuance failed: {0}")]
    IssuanceFailed(String),

    #[error("enrollment failed: {0}")]
    EnrollmentFailed(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] biolock_crypto::CryptoError),

    #[error("core error: {0}")]
    Core(#[from] biolock_core::CoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] biolock_ledger::LedgerError),
}
