//! Integration test: enrollment → issuance → biometric presentation → oracle
//! verdict → client verification, across every crate.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use biolock_core::{Address, FingerprintTemplate, MinutiaPoint};
use biolock_credentials::{
    AuthenticationRequestBuilder, BiometricEnrollment, CredentialIssuer, IssuanceListener,
    IssuanceOutcome, IssuedCredential,
};
use biolock_crypto::{EphemeralKeyStore, IssuerKey, KeyStore, OracleKeyPair};
use biolock_ledger::{InMemoryLedger, LedgerError, LedgerEvent, NewCredential};
use biolock_matcher::GreedyMatcher;
use biolock_oracle::{
    forward_requests, AuthenticationOracle, MemoryJournal, OracleSettings, OracleState,
    ResultJournal, RetryPolicy,
};
use tokio::task::JoinHandle;

const ORACLE: Address = Address::from_bytes([0xAA; 20]);
const ALICE: Address = Address::from_bytes([0x01; 20]);
const BOB: Address = Address::from_bytes([0x02; 20]);
const WAIT: Duration = Duration::from_secs(20);

fn oracle_keys() -> &'static EphemeralKeyStore {
    static KEYS: OnceLock<EphemeralKeyStore> = OnceLock::new();
    KEYS.get_or_init(|| EphemeralKeyStore::from_pair(OracleKeyPair::generate(2048).unwrap()))
}

/// 30 minutiae on a 40-unit grid, offset by `shift` along x.
fn fingerprint(shift: f64) -> FingerprintTemplate {
    FingerprintTemplate::new(
        (0..30)
            .map(|i| {
                MinutiaPoint::new(
                    (i % 6) as f64 * 40.0 + shift,
                    (i / 6) as f64 * 40.0,
                    if i % 3 == 0 { "bifurcation" } else { "ending" },
                    (i * 11 % 360) as f64,
                )
            })
            .collect(),
    )
}

struct RunningOracle {
    state: Arc<OracleState>,
    oracle: JoinHandle<()>,
    forwarder: JoinHandle<usize>,
}

impl RunningOracle {
    fn start(ledger: &Arc<InMemoryLedger>, journal: Arc<dyn ResultJournal>, from_block: u64) -> Self {
        let (tx, rx) = AuthenticationOracle::channel(16);
        let state = Arc::new(OracleState::new(ORACLE, tx.clone()));
        let settings = OracleSettings {
            account: ORACLE,
            from_block,
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(5),
                max_backoff: Duration::from_millis(20),
            },
            drain_timeout: Duration::from_secs(5),
        };
        let mut oracle = AuthenticationOracle::new(
            settings,
            Arc::new(oracle_keys().clone()),
            Arc::new(GreedyMatcher::default()),
            ledger.clone(),
            journal,
            state.clone(),
        );

        let forwarder = tokio::spawn(forward_requests(ledger.subscribe(from_block).unwrap(), tx));
        let oracle = tokio::spawn(async move {
            oracle.run(rx).await;
        });
        Self {
            state,
            oracle,
            forwarder,
        }
    }

    /// Wait until the oracle has resolved or skipped `count` requests.
    async fn settled(&self, count: u64) {
        tokio::time::timeout(WAIT, async {
            loop {
                let snap = self.state.snapshot();
                if snap.processed + snap.skipped + snap.failed >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("oracle did not settle in time");
    }

    fn stop(self) {
        self.forwarder.abort();
        self.oracle.abort();
    }
}

/// Ledger with ALICE and BOB enrolled, one registered issuer, and one
/// credential issued to each holder.
struct World {
    ledger: Arc<InMemoryLedger>,
    alice: BiometricEnrollment,
    bob: BiometricEnrollment,
    alice_cred: IssuedCredential,
    bob_cred: IssuedCredential,
}

fn world() -> World {
    let ledger = Arc::new(InMemoryLedger::new(ORACLE));
    let issuer = CredentialIssuer::new(IssuerKey::generate());
    ledger.add_issuer(issuer.address());

    let alice = BiometricEnrollment::enroll(&fingerprint(0.0)).unwrap();
    alice.register(&ledger, ALICE, "did:biolock:alice").unwrap();
    let bob = BiometricEnrollment::enroll(&fingerprint(100.0)).unwrap();
    bob.register(&ledger, BOB, "did:biolock:bob").unwrap();

    let issue = |holder: Address, claim: serde_json::Value| {
        let issued = issuer.issue(claim, holder, 1).unwrap();
        ledger
            .add_credential(NewCredential {
                id: issued.credential.id.clone(),
                issuer: issuer.address(),
                holder,
                hash: issued.hash.clone(),
                signature: issued.signature_json().unwrap(),
                validity_seconds: Some(3600),
                epoch: 1,
            })
            .unwrap();
        issued
    };
    let alice_cred = issue(ALICE, serde_json::json!({ "degree": "BSc", "name": "Alice" }));
    let bob_cred = issue(BOB, serde_json::json!({ "degree": "BSc", "name": "Bob" }));

    World {
        ledger,
        alice,
        bob,
        alice_cred,
        bob_cred,
    }
}

fn issued_results(ledger: &InMemoryLedger, cred_id: &str) -> Vec<bool> {
    ledger
        .history()
        .into_iter()
        .filter_map(|e| match e.event {
            LedgerEvent::CredentialIssued(issued) if issued.cred_id == cred_id => {
                Some(issued.result)
            }
            _ => None,
        })
        .collect()
}

// =========================================================================
// Positive and negative presentation
// =========================================================================

#[tokio::test]
async fn test_matching_capture_releases_verified_credential() {
    let w = world();
    let running = RunningOracle::start(&w.ledger, Arc::new(MemoryJournal::new()), 0);
    let mut listener = IssuanceListener::new(w.ledger.subscribe(0).unwrap());

    let cred_id = w.alice_cred.credential.id.clone();
    let public_key = oracle_keys().key_pair().public_key();
    let request = AuthenticationRequestBuilder::new(&w.alice, public_key)
        .build(ALICE, &cred_id, &fingerprint(1.5))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();

    let outcome = listener.await_result(ALICE, &cred_id, request, WAIT).await;
    assert!(outcome.is_verified(), "unexpected outcome {:?}", outcome);
    if let IssuanceOutcome::Issued { event, .. } = outcome {
        assert_eq!(event.holder, ALICE);
        assert_eq!(event.cred_hash, w.alice_cred.hash);
    }
    assert_eq!(issued_results(&w.ledger, &cred_id), vec![true]);
    running.stop();
}

#[tokio::test]
async fn test_someone_elses_finger_is_denied() {
    let w = world();
    let running = RunningOracle::start(&w.ledger, Arc::new(MemoryJournal::new()), 0);
    let mut listener = IssuanceListener::new(w.ledger.subscribe(0).unwrap());

    // Bob's finger presented against Alice's enrollment.
    let cred_id = w.alice_cred.credential.id.clone();
    let public_key = oracle_keys().key_pair().public_key();
    let request = AuthenticationRequestBuilder::new(&w.alice, public_key)
        .build(ALICE, &cred_id, &fingerprint(100.0))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();

    let outcome = listener.await_result(ALICE, &cred_id, request, WAIT).await;
    assert_eq!(outcome, IssuanceOutcome::Denied);
    running.stop();
}

#[tokio::test]
async fn test_garbled_submission_fails_closed_and_oracle_survives() {
    let w = world();
    let running = RunningOracle::start(&w.ledger, Arc::new(MemoryJournal::new()), 0);
    let mut listener = IssuanceListener::new(w.ledger.subscribe(0).unwrap());
    let public_key = oracle_keys().key_pair().public_key();

    let alice_id = w.alice_cred.credential.id.clone();
    let mut args = AuthenticationRequestBuilder::new(&w.alice, public_key)
        .build(ALICE, &alice_id, &fingerprint(0.0))
        .unwrap();
    args.submitted_info = "deadbeef:this-is-not-ciphertext".into();
    let request = args.submit(&w.ledger).unwrap();

    let outcome = listener.await_result(ALICE, &alice_id, request, WAIT).await;
    assert_eq!(outcome, IssuanceOutcome::Denied);
    assert_eq!(issued_results(&w.ledger, &alice_id), vec![false]);

    // The oracle keeps serving other holders.
    let bob_id = w.bob_cred.credential.id.clone();
    let request = AuthenticationRequestBuilder::new(&w.bob, public_key)
        .build(BOB, &bob_id, &fingerprint(100.0))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();
    let outcome = listener.await_result(BOB, &bob_id, request, WAIT).await;
    assert!(outcome.is_verified());
    running.stop();
}

#[tokio::test]
async fn test_retry_after_denial_waits_for_its_own_verdict() {
    let w = world();
    let running = RunningOracle::start(&w.ledger, Arc::new(MemoryJournal::new()), 0);
    let cred_id = w.alice_cred.credential.id.clone();
    let public_key = oracle_keys().key_pair().public_key();

    let first = AuthenticationRequestBuilder::new(&w.alice, public_key)
        .build(ALICE, &cred_id, &fingerprint(100.0))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();
    let mut listener = IssuanceListener::new(w.ledger.subscribe(0).unwrap());
    let outcome = listener.await_result(ALICE, &cred_id, first, WAIT).await;
    assert_eq!(outcome, IssuanceOutcome::Denied);

    // A fresh listener replays from block 0 and sees the earlier denial first.
    let retry = AuthenticationRequestBuilder::new(&w.alice, public_key)
        .build(ALICE, &cred_id, &fingerprint(1.5))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();
    let mut listener = IssuanceListener::new(w.ledger.subscribe(0).unwrap());
    let outcome = listener.await_result(ALICE, &cred_id, retry, WAIT).await;
    assert!(outcome.is_verified(), "unexpected outcome {:?}", outcome);
    assert_eq!(issued_results(&w.ledger, &cred_id), vec![false, true]);
    running.stop();
}

#[tokio::test]
async fn test_listener_times_out_as_unknown_without_oracle() {
    let w = world();
    let mut listener = IssuanceListener::new(w.ledger.subscribe(0).unwrap());
    let cred_id = w.alice_cred.credential.id.clone();
    let request = AuthenticationRequestBuilder::new(&w.alice, oracle_keys().key_pair().public_key())
        .build(ALICE, &cred_id, &fingerprint(0.0))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();

    let outcome = listener
        .await_result(ALICE, &cred_id, request, Duration::from_millis(100))
        .await;
    assert_eq!(outcome, IssuanceOutcome::Unknown);
}

// =========================================================================
// Exactly-once delivery
// =========================================================================

#[tokio::test]
async fn test_duplicate_delivery_yields_one_result() {
    let w = world();
    let running = RunningOracle::start(&w.ledger, Arc::new(MemoryJournal::new()), 0);
    let cred_id = w.alice_cred.credential.id.clone();
    AuthenticationRequestBuilder::new(&w.alice, oracle_keys().key_pair().public_key())
        .build(ALICE, &cred_id, &fingerprint(0.0))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();

    // A second bridge delivers the same event again.
    let replay = w
        .ledger
        .history()
        .iter()
        .find_map(|e| e.as_request())
        .unwrap();
    running.state.enqueue(replay).unwrap();

    running.settled(2).await;
    let snap = running.state.snapshot();
    assert_eq!(snap.processed, 1);
    assert_eq!(snap.skipped, 1);
    assert!(running.state.failed_submissions().is_empty());
    assert_eq!(issued_results(&w.ledger, &cred_id), vec![true]);
    running.stop();
}

#[tokio::test]
async fn test_restart_with_history_replay_does_not_resubmit() {
    let w = world();
    let journal: Arc<dyn ResultJournal> = Arc::new(MemoryJournal::new());
    let cred_id = w.alice_cred.credential.id.clone();

    let first = RunningOracle::start(&w.ledger, journal.clone(), 0);
    AuthenticationRequestBuilder::new(&w.alice, oracle_keys().key_pair().public_key())
        .build(ALICE, &cred_id, &fingerprint(0.0))
        .unwrap()
        .submit(&w.ledger)
        .unwrap();
    first.settled(1).await;
    first.stop();

    let second = RunningOracle::start(&w.ledger, journal, 0);
    second.settled(1).await;
    assert_eq!(second.state.snapshot().skipped, 1);
    assert_eq!(second.state.snapshot().processed, 0);
    assert_eq!(issued_results(&w.ledger, &cred_id), vec![true]);
    second.stop();
}

#[tokio::test]
async fn test_ledger_rejects_second_pending_request() {
    let w = world();
    let cred_id = w.alice_cred.credential.id.clone();
    let args = AuthenticationRequestBuilder::new(&w.alice, oracle_keys().key_pair().public_key())
        .build(ALICE, &cred_id, &fingerprint(0.0))
        .unwrap();
    args.submit(&w.ledger).unwrap();
    let err = w
        .ledger
        .request_credential(
            ALICE,
            &cred_id,
            &args.submitted_info,
            &args.local_info,
            &args.wrapped_key,
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::RequestPending(_)));
}

// =========================================================================
// Non-biometric presentation
// =========================================================================

#[test]
fn test_separated_info_presentation() {
    let w = world();
    let cred_id = w.alice_cred.credential.id.clone();
    let full = w.alice.blob.to_string();

    let presented = w
        .ledger
        .present_credential_separated(ALICE, &cred_id, &full, &w.alice.split.local)
        .unwrap();
    assert_eq!(presented.holder, ALICE);
    assert_eq!(presented.hash, w.alice_cred.hash);
    assert!(biolock_credentials::verify_signature(
        &presented.hash,
        &presented.signature,
        &presented.issuer
    ));

    // Bob's local half does not unlock Alice's credential.
    assert!(w
        .ledger
        .present_credential_separated(ALICE, &cred_id, &full, &w.bob.split.local)
        .is_err());
    // Nor can Bob present Alice's credential.
    assert!(w
        .ledger
        .present_credential_separated(BOB, &cred_id, &full, &w.alice.split.local)
        .is_err());
}
