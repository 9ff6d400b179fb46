//! The authentication oracle service loop.
//!
//! Requests arrive on a bounded channel and are handled one at a time in
//! delivery order. Evaluation runs inline; the ledger submission for each
//! request runs as a tracked task holding that request's [`GuardTicket`], so
//! work for different `(user, credId)` pairs overlaps while a second event
//! for the same pair is rejected until the first is resolved.

use biolock_core::{
    Address, AuthenticationResult, EventPosition, RequestKey, RequestState, RequestStateMachine,
    RequestStep,
};
use biolock_crypto::KeyStore;
use biolock_ledger::{LedgerClient, LedgerSubscription, RequestEnvelope};
use biolock_matcher::MatchingStrategy;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::error::OracleError;
use crate::guard::{GuardTicket, InFlightGuard};
use crate::journal::{JournalEntry, ResultJournal};
use crate::pipeline::{evaluate, Evaluation};
use crate::state::{FailedSubmission, OracleState};
use crate::submitter::{RetryPolicy, SubmitOutcome, Submitter};

/// Runtime settings for [`AuthenticationOracle`].
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// Ledger account results are submitted from.
    pub account: Address,
    /// Events in earlier blocks are skipped.
    pub from_block: u64,
    pub retry: RetryPolicy,
    /// Grace period for in-flight submissions at shutdown.
    pub drain_timeout: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            account: Address::ZERO,
            from_block: 0,
            retry: RetryPolicy::default(),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// What [`AuthenticationOracle::handle`] did with an event.
#[derive(Debug)]
pub enum HandleOutcome {
    /// Evaluated; the submission runs as task `task_id`.
    Dispatched { task_id: Uuid, evaluation: Evaluation },
    /// The event lies before the configured starting block.
    BeforeStartBlock,
}

/// Consumes authentication requests and reports a verdict for each.
pub struct AuthenticationOracle {
    settings: OracleSettings,
    keys: Arc<dyn KeyStore>,
    matcher: Arc<dyn MatchingStrategy>,
    journal: Arc<dyn ResultJournal>,
    state: Arc<OracleState>,
    submitter: Submitter,
    guard: InFlightGuard,
    tasks: JoinSet<Uuid>,
    last_position: Option<EventPosition>,
}

enum LoopStep {
    Request(Option<RequestEnvelope>),
    Joined(Result<Uuid, JoinError>),
}

impl AuthenticationOracle {
    pub fn new(
        settings: OracleSettings,
        keys: Arc<dyn KeyStore>,
        matcher: Arc<dyn MatchingStrategy>,
        ledger: Arc<dyn LedgerClient>,
        journal: Arc<dyn ResultJournal>,
        state: Arc<OracleState>,
    ) -> Self {
        let submitter = Submitter::new(ledger, settings.account, settings.retry.clone());
        Self {
            settings,
            keys,
            matcher,
            journal,
            state,
            submitter,
            guard: InFlightGuard::new(),
            tasks: JoinSet::new(),
            last_position: None,
        }
    }

    /// Create the bounded request channel the oracle consumes.
    pub fn channel(
        capacity: usize,
    ) -> (mpsc::Sender<RequestEnvelope>, mpsc::Receiver<RequestEnvelope>) {
        mpsc::channel(capacity.max(1))
    }

    pub fn settings(&self) -> &OracleSettings {
        &self.settings
    }

    /// Number of submissions still running.
    pub fn pending_submissions(&self) -> usize {
        self.tasks.len()
    }

    /// Handle one request event.
    ///
    /// Fails with [`OracleError::DuplicateOrOutOfOrderEvent`] if the request
    /// was already answered or is still in flight.
    pub async fn handle(&mut self, envelope: RequestEnvelope) -> Result<HandleOutcome, OracleError> {
        let RequestEnvelope { position, request } = envelope;
        let key = RequestKey::new(request.user, request.cred_id.as_str());

        if position.block < self.settings.from_block {
            tracing::debug!(key = %key, position = %position, "event before start block");
            return Ok(HandleOutcome::BeforeStartBlock);
        }

        if let Some(last) = self.last_position {
            if position < last {
                tracing::warn!(
                    key = %key,
                    position = %position,
                    last = %last,
                    "event delivered out of order"
                );
            }
        }
        self.last_position = Some(self.last_position.map_or(position, |last| last.max(position)));

        if self.journal.is_resolved(&key, position)? {
            return Err(OracleError::DuplicateOrOutOfOrderEvent {
                key,
                position,
                reason: "result already delivered".into(),
            });
        }
        let ticket = self.guard.try_acquire(key, position)?;

        tracing::info!(
            user = %request.user,
            cred_id = %request.cred_id,
            block = position.block,
            submitted_len = request.submitted_info.len(),
            stored_len = request.stored_info.len() + request.local_info.len(),
            "authentication request received"
        );

        let evaluation = evaluate(&request, self.keys.as_ref(), self.matcher.as_ref());
        let result = AuthenticationResult {
            user: request.user,
            cred_id: request.cred_id,
            matched: evaluation.matched,
        };

        let task_id = Uuid::now_v7();
        let submission = Submission {
            task_id,
            result,
            reached: evaluation.reached,
            final_step: evaluation.final_step(),
            ticket,
        };
        let submitter = self.submitter.clone();
        let journal = Arc::clone(&self.journal);
        let state = Arc::clone(&self.state);
        self.tasks
            .spawn(async move { submission.run(&submitter, journal.as_ref(), &state).await });

        Ok(HandleOutcome::Dispatched {
            task_id,
            evaluation,
        })
    }

    /// Process requests until the channel closes.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<RequestEnvelope>) {
        tracing::info!(
            account = %self.settings.account,
            from_block = self.settings.from_block,
            strategy = self.matcher.name(),
            "authentication oracle running"
        );
        loop {
            let step = tokio::select! {
                request = rx.recv() => LoopStep::Request(request),
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    LoopStep::Joined(joined)
                }
            };
            match step {
                LoopStep::Request(Some(envelope)) => self.dispatch(envelope).await,
                LoopStep::Request(None) => break,
                LoopStep::Joined(joined) => reap(joined),
            }
        }
        tracing::info!(pending = self.tasks.len(), "request channel closed");
    }

    async fn dispatch(&mut self, envelope: RequestEnvelope) {
        match self.handle(envelope).await {
            Ok(HandleOutcome::Dispatched { .. }) => {}
            Ok(HandleOutcome::BeforeStartBlock) => self.state.record_skipped(),
            Err(OracleError::DuplicateOrOutOfOrderEvent {
                key,
                position,
                reason,
            }) => {
                tracing::warn!(key = %key, position = %position, reason = %reason, "event skipped");
                self.state.record_skipped();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to handle request");
                self.state.record_skipped();
            }
        }
    }

    /// Wait for in-flight submissions, aborting whatever is still running
    /// after `timeout`. Returns the number of aborted submissions.
    pub async fn drain(&mut self, timeout: Duration) -> usize {
        let tasks = &mut self.tasks;
        let finished = tokio::time::timeout(timeout, async move {
            while let Some(joined) = tasks.join_next().await {
                reap(joined);
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }
        let aborted = self.tasks.len();
        tracing::warn!(aborted, "drain timed out, aborting submissions");
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        aborted
    }
}

fn reap(joined: Result<Uuid, JoinError>) {
    match joined {
        Ok(task_id) => tracing::trace!(task_id = %task_id, "submission task finished"),
        Err(e) if e.is_cancelled() => tracing::debug!("submission task cancelled"),
        Err(e) => tracing::error!(error = %e, "submission task panicked"),
    }
}

/// One tracked result submission.
struct Submission {
    task_id: Uuid,
    result: AuthenticationResult,
    reached: RequestState,
    final_step: RequestStep,
    /// Held until the outcome is recorded.
    ticket: GuardTicket,
}

impl Submission {
    async fn run(self, submitter: &Submitter, journal: &dyn ResultJournal, state: &OracleState) -> Uuid {
        let outcome = submitter.submit(&self.result).await;
        let position = self.ticket.position();

        match outcome {
            SubmitOutcome::Accepted { attempts } => {
                if let Err(e) = self.complete() {
                    tracing::error!(task_id = %self.task_id, error = %e, "request state machine");
                }
                let entry = JournalEntry {
                    position,
                    matched: self.result.matched,
                    attempts,
                    submitted_at: Utc::now(),
                };
                if let Err(e) = journal.record(self.ticket.key(), &entry) {
                    tracing::error!(
                        key = %self.ticket.key(),
                        error = %e,
                        "failed to journal delivered result"
                    );
                }
                state.record_result(self.result.matched);
            }
            SubmitOutcome::Rejected { attempts, error }
            | SubmitOutcome::Exhausted { attempts, error } => {
                state.record_failed(FailedSubmission {
                    id: self.task_id,
                    user: self.result.user,
                    cred_id: self.result.cred_id.clone(),
                    matched: self.result.matched,
                    position,
                    attempts,
                    error: error.to_string(),
                    failed_at: Utc::now(),
                });
            }
        }
        self.task_id
    }

    /// Walk the request from its last evaluated state back to idle.
    fn complete(&self) -> Result<(), OracleError> {
        let submitted = RequestStateMachine::transition(self.reached, self.final_step)?;
        RequestStateMachine::transition(submitted, RequestStep::Reset)?;
        Ok(())
    }
}

/// Forward `AuthenticationRequest` events from a ledger subscription into
/// the oracle's channel. Returns the number forwarded once either side
/// closes.
pub async fn forward_requests(
    mut subscription: LedgerSubscription,
    tx: mpsc::Sender<RequestEnvelope>,
) -> usize {
    let mut forwarded = 0;
    while let Some(event) = subscription.next().await {
        let Some(envelope) = event.as_request() else {
            continue;
        };
        if tx.send(envelope).await.is_err() {
            tracing::debug!("oracle channel closed, stopping forwarder");
            break;
        }
        forwarded += 1;
    }
    forwarded
}
