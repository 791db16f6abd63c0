use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use bitcoin::XOnlyPublicKey;
use fedpeg_btc_verification::ValidatedProof;
use fedpeg_config::{FederationConfig, SubmitterConfig};
use fedpeg_primitives::{DepositId, ProofHash};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::{
    sync::OnceCell,
    time::{sleep, timeout},
};
use tracing::*;

use crate::{
    FederationTransport, SubmitError, TransportError,
    quorum::{FederationStatus, RoundOutcome, tally_status, tally_submission},
    types::PegInRequest,
};

type SubmissionSlot = Arc<OnceCell<Result<DepositId, SubmitError>>>;

#[derive(Debug)]
struct Submission {
    slot: SubmissionSlot,
    started: Instant,
}

/// A caller's hold on a dedup slot.
///
/// Dropping it, whether the submission finished or its future was cancelled, removes the slot if
/// it holds a failure, or if it was never filled and no other caller is waiting on it.
struct SlotClaim<'a> {
    submissions: &'a Mutex<HashMap<ProofHash, Submission>>,
    proof_hash: ProofHash,
    slot: SubmissionSlot,
}

impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        let mut submissions = self.submissions.lock();
        let Some(current) = submissions.get(&self.proof_hash) else {
            return;
        };
        if !Arc::ptr_eq(&current.slot, &self.slot) {
            return;
        }

        let stale = match self.slot.get() {
            Some(result) => result.is_err(),
            // The table holds one reference and this claim the other.
            None => Arc::strong_count(&self.slot) == 2,
        };
        if stale {
            submissions.remove(&self.proof_hash);
        }
    }
}

/// Federation's answer to a reconciliation query after a submission timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// A quorum holds the deposit under this id.
    Known(DepositId),
    Rejected { reason: String },
    /// The federation never registered the submission.
    Unknown,
}

impl From<FederationStatus> for Reconciliation {
    fn from(status: FederationStatus) -> Self {
        match status {
            FederationStatus::Accepted(id) | FederationStatus::Confirmed(id) => Self::Known(id),
            FederationStatus::Rejected { reason } => Self::Rejected { reason },
            FederationStatus::Unknown => Self::Unknown,
        }
    }
}

/// Submits validated deposits to the federation and waits for a quorum.
///
/// Submissions are deduplicated by proof hash: callers racing on the same proof share a single
/// round trip, and a successful result is reused for the rest of the dedup window.
pub struct FederationSubmitter<T> {
    federation: FederationConfig,
    config: SubmitterConfig,
    transport: T,
    submissions: Mutex<HashMap<ProofHash, Submission>>,
}

impl<T> fmt::Debug for FederationSubmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederationSubmitter")
            .field("guardians", &self.federation.guardians.len())
            .field("threshold", &self.federation.threshold())
            .field("tracked_submissions", &self.submissions.lock().len())
            .finish_non_exhaustive()
    }
}

impl<T: FederationTransport> FederationSubmitter<T> {
    pub fn new(federation: FederationConfig, config: SubmitterConfig, transport: T) -> Self {
        Self {
            federation,
            config,
            transport,
            submissions: Mutex::new(HashMap::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submits `proof` for `claim_pubkey` and returns the id the federation assigned.
    ///
    /// Transient failures are retried with exponential backoff. An authoritative rejection is
    /// returned immediately.
    #[instrument(skip_all, fields(proof_hash = %proof.proof_hash()))]
    pub async fn submit(
        &self,
        proof: &ValidatedProof,
        claim_pubkey: &XOnlyPublicKey,
    ) -> Result<DepositId, SubmitError> {
        let proof_hash = proof.proof_hash();
        let claim = SlotClaim {
            submissions: &self.submissions,
            proof_hash,
            slot: self.slot(proof_hash),
        };

        claim
            .slot
            .get_or_init(|| async {
                let request = PegInRequest::new(proof, *claim_pubkey);
                self.submit_with_retry(&request).await
            })
            .await
            .clone()
    }

    /// Asks the federation what became of a submission whose outcome the client never saw.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, proof_hash: ProofHash) -> Reconciliation {
        let reconciliation = self.status(proof_hash).await.into();
        info!(?reconciliation, "reconciled submission");
        reconciliation
    }

    /// Queries every guardian for the status of `proof_hash` and folds the answers.
    pub async fn status(&self, proof_hash: ProofHash) -> FederationStatus {
        let request_timeout = self.config.request_timeout();
        let calls = self.federation.guardians.iter().map(|guardian| async move {
            let response = timeout(
                request_timeout,
                self.transport.peg_in_status(guardian.id, proof_hash),
            )
            .await
            .unwrap_or(Err(TransportError::Timeout {
                guardian: guardian.id,
            }));
            (guardian.id, response)
        });

        let responses = join_all(calls).await;
        tally_status(responses, self.federation.threshold())
    }

    async fn submit_with_retry(&self, request: &PegInRequest) -> Result<DepositId, SubmitError> {
        let retry = &self.config.retry;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.submit_round(request).await {
                RoundOutcome::Accepted(deposit_id) => {
                    info!(%deposit_id, attempts, "federation accepted deposit");
                    return Ok(deposit_id);
                }
                RoundOutcome::Rejected(reason) => {
                    warn!(%reason, "federation rejected deposit");
                    return Err(SubmitError::Rejected { reason });
                }
                RoundOutcome::Inconclusive(fault) => {
                    if !retry.should_retry(attempts) {
                        error!(%fault, attempts, "giving up on submission");
                        return Err(SubmitError::Timeout {
                            attempts,
                            last_fault: fault,
                        });
                    }

                    let delay = retry.calculate_delay(attempts - 1);
                    warn!(%fault, attempts, ?delay, "submission round inconclusive, retrying");
                    sleep(delay).await;
                }
            }
        }
    }

    async fn submit_round(&self, request: &PegInRequest) -> RoundOutcome {
        let request_timeout = self.config.request_timeout();
        let calls = self.federation.guardians.iter().map(|guardian| {
            let request = request.clone();
            async move {
                let response = timeout(
                    request_timeout,
                    self.transport.submit_peg_in(guardian.id, request),
                )
                .await
                .unwrap_or(Err(TransportError::Timeout {
                    guardian: guardian.id,
                }));
                if let Err(err) = &response {
                    debug!(guardian = %guardian.id, %err, "guardian request failed");
                }
                (guardian.id, response)
            }
        });

        let responses = join_all(calls).await;
        tally_submission(responses, self.federation.threshold())
    }

    fn slot(&self, proof_hash: ProofHash) -> SubmissionSlot {
        let window = self.dedup_window();
        let mut submissions = self.submissions.lock();
        submissions.retain(|_, s| !s.slot.initialized() || s.started.elapsed() < window);

        submissions
            .entry(proof_hash)
            .or_insert_with(|| Submission {
                slot: Arc::new(OnceCell::new()),
                started: Instant::now(),
            })
            .slot
            .clone()
    }

    fn dedup_window(&self) -> Duration {
        self.config.dedup_window()
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{Amount, consensus::serialize};
    use fedpeg_address::derive_deposit_address;
    use fedpeg_btc_verification::validate_pegin_proof;
    use fedpeg_config::ClientConfig;
    use fedpeg_primitives::GuardianId;
    use fedpeg_test_utils_btc::{ProofFixture, TestFederation, claim_key, deposit_tx};

    use super::*;
    use crate::{
        MockFederationTransport,
        test_utils::{FakeFederation, GuardianBehavior, expected_deposit_id},
        types::{PROTOCOL_VERSION, PegInResponse},
    };

    fn validated(config: &ClientConfig, seed: u8) -> (ValidatedProof, XOnlyPublicKey) {
        let claim = claim_key(seed).public_key();
        let address = derive_deposit_address(config, &claim).unwrap();
        let tx = deposit_tx(address.script_pubkey(), Amount::from_sat(250_000));
        let fixture = ProofFixture::new(&tx, config.pegin.min_confirmations);
        let proof =
            validate_pegin_proof(&fixture.encode(), &serialize(&tx), &address, config).unwrap();
        (proof, claim)
    }

    fn fake_submitter(config: &ClientConfig) -> FederationSubmitter<FakeFederation> {
        FederationSubmitter::new(
            config.federation.clone(),
            config.submitter.clone(),
            FakeFederation::new(&config.federation),
        )
    }

    fn g(i: u16) -> GuardianId {
        GuardianId::new(i)
    }

    #[tokio::test]
    async fn test_quorum_of_acceptances() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        let (proof, claim) = validated(&config, 1);

        let id = submitter.submit(&proof, &claim).await.unwrap();

        assert_eq!(id, expected_deposit_id(&proof.proof_hash()));
        assert_eq!(submitter.transport().total_submissions(), 4);
    }

    #[tokio::test]
    async fn test_tolerates_faulty_minority() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter
            .transport()
            .set_behavior(g(3), GuardianBehavior::Unreachable);
        let (proof, claim) = validated(&config, 1);

        let id = submitter.submit(&proof, &claim).await.unwrap();

        assert_eq!(id, expected_deposit_id(&proof.proof_hash()));
        assert_eq!(submitter.transport().submissions(g(0)), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter.transport().fail_next(g(0), 1);
        submitter.transport().fail_next(g(1), 1);
        let (proof, claim) = validated(&config, 1);

        let id = submitter.submit(&proof, &claim).await.unwrap();

        assert_eq!(id, expected_deposit_id(&proof.proof_hash()));
        assert_eq!(submitter.transport().submissions(g(0)), 2);
        assert_eq!(submitter.transport().submissions(g(2)), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter
            .transport()
            .set_behavior(g(0), GuardianBehavior::Reject("dust".to_string()));
        submitter
            .transport()
            .set_behavior(g(1), GuardianBehavior::Reject("dust".to_string()));
        let (proof, claim) = validated(&config, 1);

        let err = submitter.submit(&proof, &claim).await.unwrap_err();

        assert_eq!(
            err,
            SubmitError::Rejected {
                reason: "dust".to_string()
            }
        );
        assert!(err.is_terminal());
        assert_eq!(submitter.transport().total_submissions(), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_times_out() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter.transport().set_all(GuardianBehavior::Unreachable);
        let (proof, claim) = validated(&config, 1);

        let err = submitter.submit(&proof, &claim).await.unwrap_err();

        assert!(matches!(err, SubmitError::Timeout { attempts: 3, .. }));
        assert!(!err.is_terminal());
        assert_eq!(submitter.transport().submissions(g(0)), 3);
    }

    #[tokio::test]
    async fn test_stalled_guardians_hit_request_timeout() {
        let mut config = TestFederation::new(3).client_config();
        config.submitter.request_timeout_ms = 20;
        config.submitter.retry.max_attempts = 2;
        let submitter = fake_submitter(&config);
        submitter.transport().set_all(GuardianBehavior::Stall);
        let (proof, claim) = validated(&config, 1);

        let err = submitter.submit(&proof, &claim).await.unwrap_err();

        match err {
            SubmitError::Timeout {
                attempts,
                last_fault,
            } => {
                assert_eq!(attempts, 2);
                assert!(last_fault.contains("did not answer in time"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_version_is_transient() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter.transport().set_all(GuardianBehavior::WrongVersion);
        let (proof, claim) = validated(&config, 1);

        let err = submitter.submit(&proof, &claim).await.unwrap_err();

        assert!(matches!(err, SubmitError::Timeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_share_one_round() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter
            .transport()
            .set_all(GuardianBehavior::AcceptSlowly(Duration::from_millis(50)));
        let (proof, claim) = validated(&config, 1);

        let (a, b) = tokio::join!(
            submitter.submit(&proof, &claim),
            submitter.submit(&proof, &claim)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(submitter.transport().total_submissions(), 4);
    }

    #[tokio::test]
    async fn test_success_is_reused_within_window() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        let (proof, claim) = validated(&config, 1);

        let first = submitter.submit(&proof, &claim).await.unwrap();
        let second = submitter.submit(&proof, &claim).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(submitter.transport().total_submissions(), 4);
    }

    #[tokio::test]
    async fn test_success_expires_after_window() {
        let mut config = TestFederation::new(4).client_config();
        config.submitter.dedup_window_secs = 0;
        let submitter = fake_submitter(&config);
        let (proof, claim) = validated(&config, 1);

        let first = submitter.submit(&proof, &claim).await.unwrap();
        let second = submitter.submit(&proof, &claim).await.unwrap();

        // Guardians answer the repeat from memory, under the same id.
        assert_eq!(first, second);
        assert_eq!(submitter.transport().total_submissions(), 8);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter.transport().set_all(GuardianBehavior::Unreachable);
        let (proof, claim) = validated(&config, 1);

        assert!(submitter.submit(&proof, &claim).await.is_err());

        submitter.transport().set_all(GuardianBehavior::Accept);
        let id = submitter.submit(&proof, &claim).await.unwrap();

        assert_eq!(id, expected_deposit_id(&proof.proof_hash()));
    }

    #[tokio::test]
    async fn test_cancelled_submissions_release_their_slot() {
        let mut config = TestFederation::new(4).client_config();
        config.submitter.dedup_window_secs = 0;
        let submitter = fake_submitter(&config);
        submitter.transport().set_all(GuardianBehavior::Stall);
        let (proof, claim) = validated(&config, 1);

        for _ in 0..20 {
            let cancelled = timeout(
                Duration::from_millis(5),
                submitter.submit(&proof, &claim),
            )
            .await;
            assert!(cancelled.is_err());
        }

        assert!(submitter.submissions.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_caller_hands_round_to_waiter() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        submitter
            .transport()
            .set_all(GuardianBehavior::AcceptSlowly(Duration::from_millis(50)));
        let (proof, claim) = validated(&config, 1);

        let (cancelled, waited) = tokio::join!(
            timeout(Duration::from_millis(10), submitter.submit(&proof, &claim)),
            submitter.submit(&proof, &claim)
        );

        assert!(cancelled.is_err());
        assert_eq!(waited.unwrap(), expected_deposit_id(&proof.proof_hash()));
        assert_eq!(submitter.submissions.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_and_status() {
        let config = TestFederation::new(4).client_config();
        let submitter = fake_submitter(&config);
        let (proof, claim) = validated(&config, 1);
        let (other, _) = validated(&config, 2);

        assert_eq!(
            submitter.reconcile(proof.proof_hash()).await,
            Reconciliation::Unknown
        );

        let id = submitter.submit(&proof, &claim).await.unwrap();
        assert_eq!(
            submitter.reconcile(proof.proof_hash()).await,
            Reconciliation::Known(id)
        );
        assert_eq!(
            submitter.status(proof.proof_hash()).await,
            FederationStatus::Accepted(id)
        );

        submitter.transport().confirm(&proof.proof_hash());
        assert_eq!(
            submitter.status(proof.proof_hash()).await,
            FederationStatus::Confirmed(id)
        );
        assert_eq!(
            submitter.status(other.proof_hash()).await,
            FederationStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_request_carries_proof() {
        let config = TestFederation::new(4).client_config();
        let (proof, claim) = validated(&config, 1);
        let expected = proof.clone();

        let mut transport = MockFederationTransport::new();
        transport
            .expect_submit_peg_in()
            .times(4)
            .returning(move |_, request| {
                assert_eq!(request.version, PROTOCOL_VERSION);
                assert_eq!(request.proof_hash, expected.proof_hash());
                assert_eq!(request.outpoint, expected.outpoint());
                assert_eq!(request.amount, expected.amount());
                assert_eq!(request.claim_pubkey, claim);
                assert_eq!(request.proof, expected.raw_proof());
                Ok(PegInResponse::accepted(DepositId::new([9; 32])))
            });
        transport.expect_peg_in_status().never();

        let submitter =
            FederationSubmitter::new(config.federation.clone(), config.submitter.clone(), transport);

        assert_eq!(
            submitter.submit(&proof, &claim).await.unwrap(),
            DepositId::new([9; 32])
        );
    }
}
