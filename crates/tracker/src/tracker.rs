use std::{collections::HashMap, sync::Arc};

use bitcoin::{ScriptBuf, XOnlyPublicKey};
use fedpeg_primitives::{DepositAddress, DepositId, ProofHash};
use parking_lot::Mutex;
use tracing::*;

use crate::{
    DepositState, PendingDeposit, Resolution, TrackerError,
    store::{DepositStore, MemoryDepositStore},
};

/// Thread-safe registry of pending deposits, keyed by deposit script.
///
/// Every transition checks and updates the state under one lock, so two callers racing to submit
/// the same deposit cannot both succeed. Each change is written to the [`DepositStore`] before it
/// becomes visible; a failed write leaves the deposit as it was.
#[derive(Debug)]
pub struct DepositTracker {
    deposits: Mutex<HashMap<ScriptBuf, PendingDeposit>>,
    store: Arc<dyn DepositStore>,
    /// Deposits found mid-submission when the store was loaded and not settled since.
    interrupted: Mutex<Vec<DepositAddress>>,
}

impl Default for DepositTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositTracker {
    /// Creates a tracker that keeps deposits in memory only.
    pub fn new() -> Self {
        Self {
            deposits: Mutex::default(),
            store: Arc::new(MemoryDepositStore::new()),
            interrupted: Mutex::default(),
        }
    }

    /// Creates a tracker over `store`, restoring the deposits it holds.
    pub fn open(store: Arc<dyn DepositStore>) -> Result<Self, TrackerError> {
        let mut deposits = HashMap::new();
        let mut interrupted = Vec::new();

        for deposit in store.load()? {
            if deposit.state == DepositState::Submitting {
                interrupted.push(deposit.address.clone());
            }
            deposits.insert(deposit.address.script_pubkey().to_owned(), deposit);
        }

        info!(
            restored = deposits.len(),
            interrupted = interrupted.len(),
            "loaded tracked deposits"
        );

        Ok(Self {
            deposits: Mutex::new(deposits),
            store,
            interrupted: Mutex::new(interrupted),
        })
    }

    /// Starts tracking `address`. Returns the existing entry if it is already tracked.
    pub fn create(
        &self,
        address: &DepositAddress,
        claim_pubkey: XOnlyPublicKey,
    ) -> Result<PendingDeposit, TrackerError> {
        let mut deposits = self.deposits.lock();
        let key = address.script_pubkey();
        if let Some(existing) = deposits.get(key) {
            return Ok(existing.clone());
        }

        let deposit = PendingDeposit::new(address.clone(), claim_pubkey);
        self.store.put(&deposit)?;
        deposits.insert(key.to_owned(), deposit.clone());
        debug!(%address, "tracking new deposit");
        Ok(deposit)
    }

    pub fn get(&self, address: &DepositAddress) -> Option<PendingDeposit> {
        self.deposits.lock().get(address.script_pubkey()).cloned()
    }
    /// Marks a submission of `proof_hash` as in flight.
    ///
    /// Fails with [`TrackerError::AlreadySubmitted`] if a submission is in flight or was accepted.
    pub fn begin_submit(
        &self,
        address: &DepositAddress,
        proof_hash: ProofHash,
    ) -> Result<PendingDeposit, TrackerError> {
        self.transition(address, DepositState::Submitting, |deposit| {
            match deposit.state {
                DepositState::Derived => {
                    deposit.proof_hash = Some(proof_hash);
                    Ok(())
                }
                state @ (DepositState::Submitting
                | DepositState::Submitted
                | DepositState::Confirmed) => Err(TrackerError::AlreadySubmitted {
                    address: address.clone(),
                    state,
                }),
                from => Err(invalid(address, from, DepositState::Submitting)),
            }
        })
    }

    /// Records the id the federation assigned to an in-flight submission.
    pub fn complete_submit(
        &self,
        address: &DepositAddress,
        deposit_id: DepositId,
    ) -> Result<PendingDeposit, TrackerError> {
        self.transition(address, DepositState::Submitted, |deposit| {
            expect_state(address, deposit, DepositState::Submitting, DepositState::Submitted)?;
            deposit.deposit_id = Some(deposit_id);
            Ok(())
        })
    }

    /// Rolls an in-flight submission back so it can be attempted again.
    pub fn revert_submit(&self, address: &DepositAddress) -> Result<PendingDeposit, TrackerError> {
        self.transition(address, DepositState::Derived, |deposit| {
            expect_state(address, deposit, DepositState::Submitting, DepositState::Derived)?;
            deposit.proof_hash = None;
            Ok(())
        })
    }

    /// Records an authoritative rejection of an in-flight submission.
    pub fn reject_submit(
        &self,
        address: &DepositAddress,
        reason: String,
    ) -> Result<PendingDeposit, TrackerError> {
        self.transition(address, DepositState::Rejected, |deposit| {
            expect_state(address, deposit, DepositState::Submitting, DepositState::Rejected)?;
            deposit.rejection = Some(reason);
            Ok(())
        })
    }

    /// Applies the final outcome of an accepted deposit.
    pub fn resolve(
        &self,
        address: &DepositAddress,
        outcome: Resolution,
    ) -> Result<PendingDeposit, TrackerError> {
        let to = match outcome {
            Resolution::Confirmed => DepositState::Confirmed,
            Resolution::Rejected { .. } => DepositState::Rejected,
        };
        self.transition(address, to, |deposit| {
            expect_state(address, deposit, DepositState::Submitted, to)?;
            if let Resolution::Rejected { reason } = outcome {
                deposit.rejection = Some(reason);
            }
            Ok(())
        })
    }

    /// Returns every tracked deposit that has not reached a terminal state.
    pub fn pending(&self) -> Vec<PendingDeposit> {
        self.deposits
            .lock()
            .values()
            .filter(|d| !d.state.is_terminal())
            .cloned()
            .collect()
    }

    /// Stops tracking a deposit whose outcome is final.
    pub fn acknowledge(&self, address: &DepositAddress) -> Result<PendingDeposit, TrackerError> {
        let mut deposits = self.deposits.lock();
        let key = address.script_pubkey();
        let state = deposits
            .get(key)
            .map(|d| d.state)
            .ok_or_else(|| TrackerError::UnknownDeposit(address.clone()))?;

        if !state.is_terminal() {
            return Err(TrackerError::NotTerminal {
                address: address.clone(),
                state,
            });
        }

        self.store.remove(key)?;
        deposits
            .remove(key)
            .ok_or_else(|| TrackerError::UnknownDeposit(address.clone()))
    }

    /// Removes and returns every tracked deposit. Stored records are kept for the next
    /// [`open`](Self::open).
    pub fn drain(&self) -> Vec<PendingDeposit> {
        self.deposits.lock().drain().map(|(_, d)| d).collect()
    }

    /// Deposits that were mid-submission when the tracker was opened and are still unsettled.
    ///
    /// Their outcome is unknown to this process and has to be settled with the federation. An
    /// address leaves the list once its deposit moves out of `Submitting`.
    pub fn interrupted(&self) -> Vec<DepositAddress> {
        self.interrupted.lock().clone()
    }

    fn transition(
        &self,
        address: &DepositAddress,
        to: DepositState,
        apply: impl FnOnce(&mut PendingDeposit) -> Result<(), TrackerError>,
    ) -> Result<PendingDeposit, TrackerError> {
        let mut deposits = self.deposits.lock();
        let deposit = deposits
            .get_mut(address.script_pubkey())
            .ok_or_else(|| TrackerError::UnknownDeposit(address.clone()))?;

        let from = deposit.state;
        let mut next = deposit.clone();
        apply(&mut next)?;
        next.state = to;
        self.store.put(&next)?;

        *deposit = next.clone();
        if from == DepositState::Submitting {
            self.interrupted.lock().retain(|a| a != address);
        }
        debug!(%address, %from, %to, "deposit state changed");
        Ok(next)
    }
}

fn expect_state(
    address: &DepositAddress,
    deposit: &PendingDeposit,
    expected: DepositState,
    to: DepositState,
) -> Result<(), TrackerError> {
    if deposit.state == expected {
        Ok(())
    } else {
        Err(invalid(address, deposit.state, to))
    }
}

fn invalid(address: &DepositAddress, from: DepositState, to: DepositState) -> TrackerError {
    TrackerError::InvalidStateTransition {
        address: address.clone(),
        from,
        to,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Barrier,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    use bitcoin::{Network, Script};
    use fedpeg_address::derive_deposit_address;
    use fedpeg_test_utils_btc::{TestFederation, claim_key};

    use super::*;
    use crate::{StoreError, store::SledDepositStore};

    fn address(seed: u8) -> (DepositAddress, XOnlyPublicKey) {
        let config = TestFederation::new(3).client_config();
        let claim = claim_key(seed).public_key();
        (derive_deposit_address(&config, &claim).unwrap(), claim)
    }

    fn proof_hash(byte: u8) -> ProofHash {
        ProofHash::new([byte; 32])
    }

    #[test]
    fn test_create_is_idempotent() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);

        let first = tracker.create(&addr, claim).unwrap();
        tracker.begin_submit(&addr, proof_hash(1)).unwrap();
        let second = tracker.create(&addr, claim).unwrap();

        assert_eq!(first.state(), DepositState::Derived);
        assert_eq!(second.state(), DepositState::Submitting);
        assert_eq!(tracker.pending().len(), 1);
    }

    #[test]
    fn test_happy_path() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();

        let d = tracker.begin_submit(&addr, proof_hash(1)).unwrap();
        assert_eq!(d.state(), DepositState::Submitting);
        assert_eq!(d.proof_hash(), Some(proof_hash(1)));

        let d = tracker.complete_submit(&addr, DepositId::new([7; 32])).unwrap();
        assert_eq!(d.state(), DepositState::Submitted);
        assert_eq!(d.deposit_id(), Some(DepositId::new([7; 32])));

        let d = tracker.resolve(&addr, Resolution::Confirmed).unwrap();
        assert_eq!(d.state(), DepositState::Confirmed);
        assert!(tracker.pending().is_empty());

        let acked = tracker.acknowledge(&addr).unwrap();
        assert_eq!(acked.state(), DepositState::Confirmed);
        assert!(tracker.get(&addr).is_none());
    }

    #[test]
    fn test_resubmission_conflicts() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();
        tracker.begin_submit(&addr, proof_hash(1)).unwrap();

        let err = tracker.begin_submit(&addr, proof_hash(1)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::AlreadySubmitted {
                state: DepositState::Submitting,
                ..
            }
        ));

        tracker.complete_submit(&addr, DepositId::new([7; 32])).unwrap();
        let err = tracker.begin_submit(&addr, proof_hash(2)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::AlreadySubmitted {
                state: DepositState::Submitted,
                ..
            }
        ));
    }

    #[test]
    fn test_rejected_deposit_cannot_be_resubmitted() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();
        tracker.begin_submit(&addr, proof_hash(1)).unwrap();

        let d = tracker.reject_submit(&addr, "bad deposit".to_string()).unwrap();
        assert_eq!(d.state(), DepositState::Rejected);
        assert_eq!(d.rejection(), Some("bad deposit"));

        let err = tracker.begin_submit(&addr, proof_hash(1)).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidStateTransition {
                from: DepositState::Rejected,
                to: DepositState::Submitting,
                ..
            }
        ));
    }

    #[test]
    fn test_revert_allows_retry() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();
        tracker.begin_submit(&addr, proof_hash(1)).unwrap();

        let d = tracker.revert_submit(&addr).unwrap();
        assert_eq!(d.state(), DepositState::Derived);
        assert_eq!(d.proof_hash(), None);

        tracker.begin_submit(&addr, proof_hash(1)).unwrap();
    }

    #[test]
    fn test_submitted_deposit_cannot_revert() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();
        tracker.begin_submit(&addr, proof_hash(1)).unwrap();
        tracker.complete_submit(&addr, DepositId::new([7; 32])).unwrap();

        let err = tracker.revert_submit(&addr).unwrap_err();

        assert!(matches!(
            err,
            TrackerError::InvalidStateTransition {
                from: DepositState::Submitted,
                to: DepositState::Derived,
                ..
            }
        ));
        let deposit = tracker.get(&addr).unwrap();
        assert_eq!(deposit.state(), DepositState::Submitted);
        assert_eq!(deposit.proof_hash(), Some(proof_hash(1)));
    }

    #[test]
    fn test_invalid_transitions() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();

        assert!(matches!(
            tracker.complete_submit(&addr, DepositId::new([7; 32])),
            Err(TrackerError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            tracker.revert_submit(&addr),
            Err(TrackerError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            tracker.resolve(&addr, Resolution::Confirmed),
            Err(TrackerError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            tracker.acknowledge(&addr),
            Err(TrackerError::NotTerminal {
                state: DepositState::Derived,
                ..
            })
        ));
        assert_eq!(tracker.get(&addr).unwrap().state(), DepositState::Derived);
    }

    #[test]
    fn test_resolve_rejected_records_reason() {
        let tracker = DepositTracker::new();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();
        tracker.begin_submit(&addr, proof_hash(1)).unwrap();
        tracker.complete_submit(&addr, DepositId::new([7; 32])).unwrap();

        let d = tracker
            .resolve(
                &addr,
                Resolution::Rejected {
                    reason: "reorged out".to_string(),
                },
            )
            .unwrap();

        assert_eq!(d.state(), DepositState::Rejected);
        assert_eq!(d.rejection(), Some("reorged out"));
    }

    #[test]
    fn test_unknown_deposit() {
        let tracker = DepositTracker::new();
        let (addr, _) = address(1);

        assert!(matches!(
            tracker.begin_submit(&addr, proof_hash(1)),
            Err(TrackerError::UnknownDeposit(_))
        ));
        assert!(matches!(
            tracker.acknowledge(&addr),
            Err(TrackerError::UnknownDeposit(_))
        ));
    }

    #[test]
    fn test_drain_empties_tracker() {
        let tracker = DepositTracker::new();
        for seed in 1..=3 {
            let (addr, claim) = address(seed);
            tracker.create(&addr, claim).unwrap();
        }

        assert_eq!(tracker.drain().len(), 3);
        assert!(tracker.pending().is_empty());
    }

    #[test]
    fn test_concurrent_begin_submit_admits_one() {
        const THREADS: usize = 8;

        let tracker = Arc::new(DepositTracker::new());
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();

        let barrier = Arc::new(Barrier::new(THREADS));
        let successes = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let tracker = tracker.clone();
                let barrier = barrier.clone();
                let successes = successes.clone();
                let addr = addr.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if tracker.begin_submit(&addr, proof_hash(1)).is_ok() {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    /// Store that fails every write once armed.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryDepositStore,
        failing: Mutex<bool>,
    }

    impl DepositStore for FlakyStore {
        fn load(&self) -> Result<Vec<PendingDeposit>, StoreError> {
            self.inner.load()
        }

        fn put(&self, deposit: &PendingDeposit) -> Result<(), StoreError> {
            if *self.failing.lock() {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.put(deposit)
        }

        fn remove(&self, script_pubkey: &Script) -> Result<(), StoreError> {
            self.inner.remove(script_pubkey)
        }
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let store = Arc::new(FlakyStore::default());
        let tracker = DepositTracker::open(store.clone()).unwrap();
        let (addr, claim) = address(1);
        tracker.create(&addr, claim).unwrap();

        *store.failing.lock() = true;
        let err = tracker.begin_submit(&addr, proof_hash(1)).unwrap_err();

        assert!(matches!(err, TrackerError::Store(StoreError::Backend(_))));
        let deposit = tracker.get(&addr).unwrap();
        assert_eq!(deposit.state(), DepositState::Derived);
        assert_eq!(deposit.proof_hash(), None);
    }

    #[test]
    fn test_reopen_restores_deposits() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let open = || {
            let store = SledDepositStore::new(&db, Network::Regtest).unwrap();
            DepositTracker::open(Arc::new(store)).unwrap()
        };
        let (submitted, claim_a) = address(1);
        let (in_flight, claim_b) = address(2);
        let (acked, claim_c) = address(3);

        let tracker = open();
        for (addr, claim) in [(&submitted, claim_a), (&in_flight, claim_b), (&acked, claim_c)] {
            tracker.create(addr, claim).unwrap();
            tracker.begin_submit(addr, proof_hash(1)).unwrap();
        }
        tracker.complete_submit(&submitted, DepositId::new([7; 32])).unwrap();
        tracker
            .reject_submit(&acked, "below minimum".to_string())
            .unwrap();
        tracker.acknowledge(&acked).unwrap();
        assert_eq!(tracker.drain().len(), 2);
        drop(tracker);

        let restored = open();

        let deposit = restored.get(&submitted).unwrap();
        assert_eq!(deposit.state(), DepositState::Submitted);
        assert_eq!(deposit.deposit_id(), Some(DepositId::new([7; 32])));
        assert_eq!(restored.get(&in_flight).unwrap().state(), DepositState::Submitting);
        assert!(restored.get(&acked).is_none());

        assert_eq!(restored.interrupted(), vec![in_flight.clone()]);
        assert_eq!(restored.interrupted(), vec![in_flight.clone()]);

        restored.revert_submit(&in_flight).unwrap();
        assert!(restored.interrupted().is_empty());
    }
}
