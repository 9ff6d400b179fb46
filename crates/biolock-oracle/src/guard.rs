//! In-flight idempotency guard keyed by `(user, credId)`.

use biolock_core::{EventPosition, RequestKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::OracleError;

/// Tracks requests between acceptance and the end of their submission.
///
/// At most one ticket exists per key; a second event for a key that is
/// still in flight is rejected.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    inflight: Arc<DashMap<RequestKey, EventPosition>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for the event at `position`.
    pub fn try_acquire(
        &self,
        key: RequestKey,
        position: EventPosition,
    ) -> Result<GuardTicket, OracleError> {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(existing) => Err(OracleError::DuplicateOrOutOfOrderEvent {
                key,
                position,
                reason: format!("request from {} still in flight", existing.get()),
            }),
            Entry::Vacant(slot) => {
                slot.insert(position);
                Ok(GuardTicket {
                    key,
                    position,
                    inflight: Arc::clone(&self.inflight),
                })
            }
        }
    }

    pub fn is_in_flight(&self, key: &RequestKey) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct GuardTicket {
    key: RequestKey,
    position: EventPosition,
    inflight: Arc<DashMap<RequestKey, EventPosition>>,
}

impl GuardTicket {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn position(&self) -> EventPosition {
        self.position
    }
}

impl Drop for GuardTicket {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}
