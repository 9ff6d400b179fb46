//! In-process credential registry.
//!
//! Implements the ledger surface the oracle and its clients rely on (DID
//! registry, issuer registry, credential registry, authentication requests
//! and results) with an append-only event log, so complete flows run without
//! a chain. Each emitted event occupies its own block.

use async_trait::async_trait;
use biolock_core::{
    Address, AuthenticationRequestEvent, AuthenticationResult, CredentialIssuedEvent,
    EventPosition, RequestKey,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::error::LedgerError;
use crate::events::{LedgerEvent, PositionedEvent};
use crate::traits::LedgerClient;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct DidRecord {
    did: String,
    info: String,
}

/// A credential as recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: String,
    pub issuer: Address,
    pub holder: Address,
    pub hash: String,
    pub signature: String,
    pub epoch: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }
}

/// Arguments of `addCredential`.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub id: String,
    pub issuer: Address,
    pub holder: Address,
    pub hash: String,
    pub signature: String,
    /// Lifetime from now; `None` never expires.
    pub validity_seconds: Option<u64>,
    pub epoch: u64,
}

/// What a successful presentation reveals to the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedCredential {
    pub issuer: Address,
    pub holder: Address,
    pub hash: String,
    pub signature: String,
}

/// Replays logged events from a starting block, then follows live ones.
///
/// A subscriber that falls behind the live channel catches up from the
/// retained log, so every event is delivered once and in log order.
pub struct LedgerSubscription {
    backlog: VecDeque<PositionedEvent>,
    live: broadcast::Receiver<PositionedEvent>,
    log: Arc<Mutex<Vec<PositionedEvent>>>,
    from_block: u64,
    /// Position of the last event handed out.
    delivered: Option<EventPosition>,
}

impl LedgerSubscription {
    /// Next event in log order, or `None` once the ledger is gone.
    pub async fn next(&mut self) -> Option<PositionedEvent> {
        loop {
            if let Some(event) = self.backlog.pop_front() {
                self.delivered = Some(event.position);
                return Some(event);
            }
            match self.live.recv().await {
                Ok(event) if self.wants(&event) => {
                    self.delivered = Some(event.position);
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "ledger subscription lagged, replaying from log");
                    if !self.reload() {
                        return None;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn wants(&self, event: &PositionedEvent) -> bool {
        event.position.block >= self.from_block
            && self.delivered.map_or(true, |last| event.position > last)
    }

    /// Refill the backlog with logged events not yet delivered.
    fn reload(&mut self) -> bool {
        let Ok(log) = self.log.lock() else {
            tracing::error!("event log lock poisoned, ending subscription");
            return false;
        };
        let backlog = log.iter().filter(|e| self.wants(e)).cloned().collect();
        self.backlog = backlog;
        true
    }
}

/// In-memory ledger with DID, issuer and credential registries.
pub struct InMemoryLedger {
    oracle: Address,
    dids: DashMap<Address, DidRecord>,
    issuers: DashMap<Address, DateTime<Utc>>,
    credentials: DashMap<String, CredentialRecord>,
    /// Requests awaiting a verdict, with the position of their event.
    pending: DashMap<RequestKey, EventPosition>,
    log: Arc<Mutex<Vec<PositionedEvent>>>,
    event_tx: broadcast::Sender<PositionedEvent>,
}

impl InMemoryLedger {
    /// Create an empty ledger that accepts results only from `oracle`.
    pub fn new(oracle: Address) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            oracle,
            dids: DashMap::new(),
            issuers: DashMap::new(),
            credentials: DashMap::new(),
            pending: DashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            event_tx,
        }
    }

    pub fn oracle(&self) -> Address {
        self.oracle
    }

    // ----- DID registry -----

    /// Register a holder's DID together with the ledger-visible half of
    /// their enrolled blob.
    pub fn register(&self, holder: Address, did: &str, info: &str) -> Result<(), LedgerError> {
        match self.dids.entry(holder) {
            Entry::Occupied(_) => Err(LedgerError::AlreadyRegistered(holder)),
            Entry::Vacant(slot) => {
                slot.insert(DidRecord {
                    did: did.to_string(),
                    info: info.to_string(),
                });
                tracing::info!(holder = %holder, did, "holder registered");
                Ok(())
            }
        }
    }

    pub fn get_info(&self, holder: &Address) -> Result<String, LedgerError> {
        self.dids
            .get(holder)
            .map(|r| r.info.clone())
            .ok_or(LedgerError::NotRegistered(*holder))
    }

    pub fn get_did(&self, holder: &Address) -> Result<String, LedgerError> {
        self.dids
            .get(holder)
            .map(|r| r.did.clone())
            .ok_or(LedgerError::NotRegistered(*holder))
    }

    /// `local_info + stored_info == info`.
    pub fn authenticate_separated(&self, holder: &Address, info: &str, local_info: &str) -> bool {
        self.dids
            .get(holder)
            .map(|r| format!("{}{}", local_info, r.info) == info)
            .unwrap_or(false)
    }

    // ----- Issuer registry -----

    pub fn add_issuer(&self, issuer: Address) {
        self.issuers.insert(issuer, Utc::now());
        tracing::info!(issuer = %issuer, "issuer added");
    }

    pub fn is_issuer(&self, issuer: &Address) -> bool {
        self.issuers.contains_key(issuer)
    }

    // ----- Credential registry -----

    pub fn add_credential(&self, new: NewCredential) -> Result<(), LedgerError> {
        if !self.is_issuer(&new.issuer) {
            return Err(LedgerError::UnknownIssuer(new.issuer));
        }
        let issued_at = Utc::now();
        let expires_at = match new.validity_seconds {
            Some(secs) => {
                let expiry = i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .and_then(|validity| issued_at.checked_add_signed(validity))
                    .ok_or_else(|| {
                        LedgerError::Internal(format!("validity too large: {}", secs))
                    })?;
                Some(expiry)
            }
            None => None,
        };

        match self.credentials.entry(new.id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::CredentialExists(new.id)),
            Entry::Vacant(slot) => {
                tracing::info!(
                    cred_id = %new.id,
                    issuer = %new.issuer,
                    holder = %new.holder,
                    epoch = new.epoch,
                    "credential added"
                );
                slot.insert(CredentialRecord {
                    id: new.id,
                    issuer: new.issuer,
                    holder: new.holder,
                    hash: new.hash,
                    signature: new.signature,
                    epoch: new.epoch,
                    issued_at,
                    expires_at,
                });
                Ok(())
            }
        }
    }

    pub fn credential(&self, cred_id: &str) -> Option<CredentialRecord> {
        self.credentials.get(cred_id).map(|r| r.clone())
    }

    /// Look up a credential that `caller` holds and that has not expired.
    fn held_credential(&self, caller: Address, cred_id: &str) -> Result<CredentialRecord, LedgerError> {
        let record = self
            .credential(cred_id)
            .ok_or_else(|| LedgerError::CredentialNotFound(cred_id.to_string()))?;
        if record.holder != caller {
            return Err(LedgerError::NotHolder {
                cred_id: cred_id.to_string(),
                caller,
            });
        }
        if record.is_expired(Utc::now()) {
            return Err(LedgerError::Expired(cred_id.to_string()));
        }
        Ok(record)
    }

    /// Ask the oracle to authenticate `user` biometrically before releasing
    /// `cred_id`. Emits `AuthenticationRequest`; at most one request per
    /// `(user, credId)` may be pending.
    pub fn request_credential(
        &self,
        user: Address,
        cred_id: &str,
        submitted_info: &str,
        local_info: &str,
        wrapped_key: &str,
    ) -> Result<EventPosition, LedgerError> {
        self.held_credential(user, cred_id)?;
        let stored_info = self.get_info(&user)?;

        let key = RequestKey::new(user, cred_id);
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => return Err(LedgerError::RequestPending(key)),
            Entry::Vacant(slot) => {
                slot.insert(EventPosition::default());
            }
        }

        let event = LedgerEvent::AuthenticationRequest(AuthenticationRequestEvent {
            user,
            cred_id: cred_id.to_string(),
            submitted_info: submitted_info.to_string(),
            stored_info,
            local_info: local_info.to_string(),
            wrapped_key: wrapped_key.to_string(),
        });
        match self.emit(event) {
            Ok(position) => {
                self.pending.insert(key, position);
                Ok(position)
            }
            Err(e) => {
                self.pending.remove(&key);
                Err(e)
            }
        }
    }

    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Present a credential using the non-biometric split-info check.
    pub fn present_credential_separated(
        &self,
        caller: Address,
        cred_id: &str,
        info: &str,
        local_info: &str,
    ) -> Result<PresentedCredential, LedgerError> {
        let record = self.held_credential(caller, cred_id)?;
        if !self.authenticate_separated(&caller, info, local_info) {
            tracing::warn!(holder = %caller, cred_id, "separated info did not authenticate");
            return Err(LedgerError::AuthenticationFailed(caller));
        }
        Ok(PresentedCredential {
            issuer: record.issuer,
            holder: record.holder,
            hash: record.hash,
            signature: record.signature,
        })
    }

    fn accept_result(
        &self,
        from: Address,
        result: &AuthenticationResult,
    ) -> Result<EventPosition, LedgerError> {
        if from != self.oracle {
            return Err(LedgerError::UnauthorizedOracle(from));
        }
        let key = result.key();
        let (_, request_position) = self
            .pending
            .remove(&key)
            .ok_or_else(|| LedgerError::NoPendingRequest(key.clone()))?;

        let record = self
            .credential(&result.cred_id)
            .ok_or_else(|| LedgerError::CredentialNotFound(result.cred_id.clone()))?;

        let position = self.emit(LedgerEvent::CredentialIssued(CredentialIssuedEvent {
            user: result.user,
            cred_id: result.cred_id.clone(),
            issuer: record.issuer,
            holder: record.holder,
            cred_hash: record.hash,
            signature: record.signature,
            result: result.matched,
        }))?;

        tracing::info!(
            user = %result.user,
            cred_id = %result.cred_id,
            matched = result.matched,
            request = %request_position,
            "authentication result accepted"
        );
        Ok(position)
    }

    // ----- Event log -----

    fn emit(&self, event: LedgerEvent) -> Result<EventPosition, LedgerError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| LedgerError::Internal("event log lock poisoned".into()))?;
        let position = EventPosition::new(log.len() as u64 + 1, 0);
        let positioned = PositionedEvent { position, event };
        tracing::debug!(event = positioned.event.name(), position = %position, "ledger event");
        log.push(positioned.clone());
        // No live subscribers is fine; the log keeps the event for replay.
        let _ = self.event_tx.send(positioned);
        Ok(position)
    }

    /// Subscribe to events at or after `from_block`. Block `0` replays the
    /// whole history.
    pub fn subscribe(&self, from_block: u64) -> Result<LedgerSubscription, LedgerError> {
        let log = self
            .log
            .lock()
            .map_err(|_| LedgerError::Internal("event log lock poisoned".into()))?;
        let backlog = log
            .iter()
            .filter(|e| e.position.block >= from_block)
            .cloned()
            .collect();
        // Subscribe while the log is locked so nothing falls between replay
        // and live delivery.
        let live = self.event_tx.subscribe();
        Ok(LedgerSubscription {
            backlog,
            live,
            log: Arc::clone(&self.log),
            from_block,
            delivered: None,
        })
    }

    /// Snapshot of every event emitted so far.
    pub fn history(&self) -> Vec<PositionedEvent> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn latest_block(&self) -> u64 {
        self.log.lock().map(|log| log.len() as u64).unwrap_or(0)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn handle_authentication_result(
        &self,
        from: Address,
        result: &AuthenticationResult,
    ) -> Result<(), LedgerError> {
        self.accept_result(from, result).map(|_| ())
    }

    fn client_id(&self) -> &str {
        "in-memory"
    }
}
