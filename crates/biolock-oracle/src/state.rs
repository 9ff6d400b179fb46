//! Shared oracle state for cross-task communication.

use biolock_core::{Address, EventPosition};
use biolock_ledger::RequestEnvelope;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::error::OracleError;

/// A result the ledger never accepted; kept for an operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSubmission {
    pub id: uuid::Uuid,
    pub user: Address,
    pub cred_id: String,
    pub matched: bool,
    pub position: EventPosition,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Counter snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub received: u64,
    pub processed: u64,
    pub matched: u64,
    pub denied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub uptime_secs: u64,
}

/// Shared state for the running oracle, accessible from HTTP handlers.
pub struct OracleState {
    /// Ledger account results are submitted from.
    pub account: Address,
    /// When the oracle started.
    pub start_time: Instant,
    /// Intake side of the bounded request channel.
    request_tx: mpsc::Sender<RequestEnvelope>,
    received: AtomicU64,
    processed: AtomicU64,
    matched: AtomicU64,
    denied: AtomicU64,
    skipped: AtomicU64,
    failed: RwLock<Vec<FailedSubmission>>,
}

impl OracleState {
    pub fn new(account: Address, request_tx: mpsc::Sender<RequestEnvelope>) -> Self {
        Self {
            account,
            start_time: Instant::now(),
            request_tx,
            received: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            matched: AtomicU64::new(0),
            denied: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: RwLock::new(Vec::new()),
        }
    }

    /// Enqueue a request without waiting; a full channel is reported, not
    /// awaited.
    pub fn enqueue(&self, envelope: RequestEnvelope) -> Result<(), OracleError> {
        self.request_tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => OracleError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => OracleError::ChannelClosed,
        })?;
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_result(&self, matched: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if matched {
            self.matched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self, failed: FailedSubmission) {
        tracing::error!(
            id = %failed.id,
            user = %failed.user,
            cred_id = %failed.cred_id,
            attempts = failed.attempts,
            error = %failed.error,
            "result submission abandoned"
        );
        if let Ok(mut list) = self.failed.write() {
            list.push(failed);
        }
    }

    pub fn failed_submissions(&self) -> Vec<FailedSubmission> {
        self.failed.read().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.read().map(|l| l.len() as u64).unwrap_or(0),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
