//! Biolock Authentication Oracle
//!
//! Consumes `AuthenticationRequest` events, reconstructs and decrypts the
//! enrolled and submitted templates, matches them, and reports a boolean
//! verdict back to the ledger exactly once per `(user, credId)`.

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod journal;
pub mod oracle;
pub mod pipeline;
pub mod state;
pub mod submitter;

pub use config::OracleConfig;
pub use error::OracleError;
pub use guard::{GuardTicket, InFlightGuard};
pub use journal::{JournalEntry, MemoryJournal, ResultJournal, RocksJournal};
pub use oracle::{forward_requests, AuthenticationOracle, HandleOutcome, OracleSettings};
pub use pipeline::{evaluate, Evaluation};
pub use state::{FailedSubmission, OracleState, StatusSnapshot};
pub use submitter::{RetryPolicy, SubmitOutcome, Submitter};
