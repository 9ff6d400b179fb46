//! Result submission with bounded exponential backoff.

use biolock_core::{Address, AuthenticationResult};
use biolock_ledger::{LedgerClient, LedgerError};
use std::sync::Arc;
use std::time::Duration;

/// How often and how patiently a submission is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from the initial backoff
    /// and capped at the maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// How a submission ended.
#[derive(Debug)]
pub enum SubmitOutcome {
    Accepted { attempts: u32 },
    /// The ledger refused the result; retrying would not help.
    Rejected { attempts: u32, error: LedgerError },
    /// Every attempt failed with a transient error.
    Exhausted { attempts: u32, error: LedgerError },
}

impl SubmitOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            SubmitOutcome::Accepted { attempts }
            | SubmitOutcome::Rejected { attempts, .. }
            | SubmitOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Submits results from the oracle account through a [`LedgerClient`].
#[derive(Clone)]
pub struct Submitter {
    client: Arc<dyn LedgerClient>,
    account: Address,
    policy: RetryPolicy,
}

impl Submitter {
    pub fn new(client: Arc<dyn LedgerClient>, account: Address, policy: RetryPolicy) -> Self {
        Self {
            client,
            account,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn submit(&self, result: &AuthenticationResult) -> SubmitOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .client
                .handle_authentication_result(self.account, result)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        user = %result.user,
                        cred_id = %result.cred_id,
                        matched = result.matched,
                        attempt,
                        client = self.client.client_id(),
                        "result submitted"
                    );
                    return SubmitOutcome::Accepted { attempts: attempt };
                }
                Err(error) if !error.is_retryable() => {
                    return SubmitOutcome::Rejected {
                        attempts: attempt,
                        error,
                    };
                }
                Err(error) if attempt >= self.policy.max_attempts => {
                    return SubmitOutcome::Exhausted {
                        attempts: attempt,
                        error,
                    };
                }
                Err(error) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        user = %result.user,
                        cred_id = %result.cred_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "result submission failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` calls with a transient error, then records
    /// results.
    pub(crate) struct FlakyLedger {
        failures: u32,
        calls: AtomicU32,
        pub(crate) accepted: Mutex<Vec<AuthenticationResult>>,
    }

    impl FlakyLedger {
        pub(crate) fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                accepted: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LedgerClient for FlakyLedger {
        async fn handle_authentication_result(
            &self,
            _from: Address,
            result: &AuthenticationResult,
        ) -> Result<(), LedgerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(LedgerError::Submission("connection reset".into()));
            }
            self.accepted.lock().unwrap().push(result.clone());
            Ok(())
        }

        fn client_id(&self) -> &str {
            "flaky"
        }
    }

    pub(crate) fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn result() -> AuthenticationResult {
        AuthenticationResult {
            user: Address::ZERO,
            cred_id: "0xc1".into(),
            matched: true,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(40), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_retries_until_accepted() {
        let ledger = Arc::new(FlakyLedger::new(2));
        let submitter = Submitter::new(ledger.clone(), Address::ZERO, fast_policy(5));
        let outcome = submitter.submit(&result()).await;
        assert!(matches!(outcome, SubmitOutcome::Accepted { attempts: 3 }));
        assert_eq!(ledger.accepted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let ledger = Arc::new(FlakyLedger::new(10));
        let submitter = Submitter::new(ledger.clone(), Address::ZERO, fast_policy(3));
        let outcome = submitter.submit(&result()).await;
        assert!(matches!(outcome, SubmitOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(ledger.calls(), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let ledger = Arc::new(biolock_ledger::InMemoryLedger::new(Address::ZERO));
        let submitter = Submitter::new(ledger, Address::ZERO, fast_policy(5));
        let outcome = submitter.submit(&result()).await;
        match outcome {
            SubmitOutcome::Rejected { attempts, error } => {
                assert_eq!(attempts, 1);
                assert!(matches!(error, LedgerError::NoPendingRequest(_)));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gateway_client_error_is_not_retried() {
        use axum::{http::StatusCode, routing::post, Router};
        use biolock_ledger::HttpLedgerGateway;

        let app = Router::new().route(
            "/api/v1/authentication-results",
            post(|| async { (StatusCode::BAD_REQUEST, "unknown credential") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let gateway = HttpLedgerGateway::new(format!("http://{}", addr));
        let submitter = Submitter::new(Arc::new(gateway), Address::ZERO, fast_policy(5));
        match submitter.submit(&result()).await {
            SubmitOutcome::Rejected { attempts, error } => {
                assert_eq!(attempts, 1);
                assert!(matches!(error, LedgerError::Rejected { status: 400, .. }));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
