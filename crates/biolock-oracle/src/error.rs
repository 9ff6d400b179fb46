use biolock_core::{EventPosition, RequestKey};

/// Oracle errors.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The event was already resolved, is still in flight, or precedes the
    /// configured starting block.
    #[error("duplicate or out-of-order event for {key} at {position}: {reason}")]
    DuplicateOrOutOfOrderEvent {
        key: RequestKey,
        position: EventPosition,
        reason: String,
    },

    #[error("request channel is full")]
    ChannelFull,

    #[error("request channel is closed")]
    ChannelClosed,

    #[error("journal error: {0}")]
    Journal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] biolock_crypto::CryptoError),

    #[error("core error: {0}")]
    Core(#[from] biolock_core::CoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] biolock_ledger::LedgerError),

    #[error("matcher error: {0}")]
    Matcher(#[from] biolock_matcher::MatchError),
}
