use biolock_core::{Address, RequestKey};

/// Ledger-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("result submission failed: {0}")]
    Submission(String),

    #[error("ledger gateway rejected result (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("{0} is not the oracle account")]
    UnauthorizedOracle(Address),

    #[error("no pending authentication request for {0}")]
    NoPendingRequest(RequestKey),

    #[error("authentication request already pending for {0}")]
    RequestPending(RequestKey),

    #[error("holder already registered: {0}")]
    AlreadyRegistered(Address),

    #[error("holder not registered: {0}")]
    NotRegistered(Address),

    #[error("issuer not registered: {0}")]
    UnknownIssuer(Address),

    #[error("credential already exists: {0}")]
    CredentialExists(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("credential {cred_id} is not held by {caller}")]
    NotHolder { cred_id: String, caller: Address },

    #[error("credential expired: {0}")]
    Expired(String),

    #[error("authentication failed for {0}")]
    AuthenticationFailed(Address),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Whether resubmitting the same call may succeed. Rejections decided by
    /// ledger state (wrong account, no pending request, a 4xx from the
    /// gateway) will not change on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Submission(_) | LedgerError::Internal(_))
    }
}
