//! Biolock Ledger
//!
//! The ledger collaborator as seen from the oracle and its clients: the
//! events it emits, the [`LedgerClient`] interface results are submitted
//! through, an in-process registry that implements the full surface for
//! local runs and tests, and an HTTP gateway to a ledger bridge.

pub mod error;
pub mod events;
pub mod http;
pub mod memory;
pub mod traits;

pub use error::LedgerError;
pub use events::{LedgerEvent, PositionedEvent, RequestEnvelope};
pub use http::HttpLedgerGateway;
pub use memory::{CredentialRecord, InMemoryLedger, LedgerSubscription, NewCredential, PresentedCredential};
pub use traits::LedgerClient;
