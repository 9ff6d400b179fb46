//! HTTP bridge to a ledger node.

use async_trait::async_trait;
use biolock_core::{Address, AuthenticationResult};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

use crate::error::LedgerError;
use crate::traits::LedgerClient;

const RESULTS_PATH: &str = "/api/v1/authentication-results";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultSubmission<'a> {
    user: Address,
    cred_id: &'a str,
    matched: bool,
    from: Address,
}

/// Submits oracle verdicts to a ledger bridge over HTTP.
///
/// Each result is POSTed as `{user, credId, matched, from}` to
/// `<gateway_url>/api/v1/authentication-results`. Transport failures,
/// timeouts and 5xx statuses are a retryable [`LedgerError::Submission`].
/// A 4xx status (other than 408 and 429) is a final [`LedgerError::Rejected`].
#[derive(Debug, Clone)]
pub struct HttpLedgerGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedgerGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Gateway whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn results_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), RESULTS_PATH)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerGateway {
    async fn handle_authentication_result(
        &self,
        from: Address,
        result: &AuthenticationResult,
    ) -> Result<(), LedgerError> {
        let body = ResultSubmission {
            user: result.user,
            cred_id: &result.cred_id,
            matched: result.matched,
            from,
        };

        let resp = self
            .client
            .post(self.results_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Submission(format!("request failed: {}", e)))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(
                user = %result.user,
                cred_id = %result.cred_id,
                status = %status,
                "result accepted by ledger gateway"
            );
            return Ok(());
        }

        let detail = resp.text().await.unwrap_or_default();
        if status.is_client_error()
            && status != StatusCode::REQUEST_TIMEOUT
            && status != StatusCode::TOO_MANY_REQUESTS
        {
            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }
        Err(LedgerError::Submission(format!("HTTP {}: {}", status, detail)))
    }

    fn client_id(&self) -> &str {
        "http-gateway"
    }
}
