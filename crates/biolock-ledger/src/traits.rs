use async_trait::async_trait;
use biolock_core::{Address, AuthenticationResult};

use crate::error::LedgerError;

/// Transaction target for the oracle's verdicts.
///
/// Implementations bridge the oracle to a concrete ledger (an in-process
/// registry, an HTTP bridge, a chain client).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit `handleAuthenticationResult(user, credId, matched)` from the
    /// account `from`.
    async fn handle_authentication_result(
        &self,
        from: Address,
        result: &AuthenticationResult,
    ) -> Result<(), LedgerError>;

    /// Short identifier used in logs (e.g. "in-memory").
    fn client_id(&self) -> &str;
}
