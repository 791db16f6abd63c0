use std::sync::Arc;

use fedpeg_address::derive_deposit_address;
use fedpeg_btc_verification::{ValidatedProof, validate_pegin_proof};
use fedpeg_config::ClientConfig;
use fedpeg_federation::{
    FederationStatus, FederationSubmitter, FederationTransport, Reconciliation, RpcTransport,
    SubmitError,
};
use fedpeg_primitives::{ClaimKey, DepositAddress, DepositId, ProofHash};
use fedpeg_tracker::{
    DepositState, DepositStore, DepositTracker, MemoryDepositStore, PendingDeposit, Resolution,
    SledDepositStore, TrackerError,
};
use tokio::time::timeout;
use tracing::*;

use crate::ClientError;

/// Entry point for depositors.
///
/// Holds no global state: everything it needs comes from the [`ClientConfig`] it is built with.
#[derive(Debug)]
pub struct PegInClient<T = RpcTransport> {
    config: Arc<ClientConfig>,
    tracker: DepositTracker,
    submitter: FederationSubmitter<T>,
}

impl PegInClient<RpcTransport> {
    /// Builds a client that talks JSON-RPC to the configured guardians.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport =
            RpcTransport::new(&config.federation, config.submitter.request_timeout())?;
        Self::with_transport(config, transport)
    }
}

impl<T: FederationTransport> PegInClient<T> {
    /// Builds a client over a custom transport.
    ///
    /// Deposits are kept in a sled database under `storage.data_dir` when it is set, and in memory
    /// otherwise.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ClientError> {
        config.validate()?;
        let store: Arc<dyn DepositStore> = match &config.storage.data_dir {
            Some(data_dir) => Arc::new(SledDepositStore::open(data_dir, config.network)?),
            None => Arc::new(MemoryDepositStore::new()),
        };
        Self::with_store(config, transport, store)
    }

    /// Builds a client over a custom transport and deposit store, restoring the deposits the
    /// store holds. Submissions left in flight by a previous run are settled by [`Self::resume`].
    pub fn with_store(
        config: ClientConfig,
        transport: T,
        store: Arc<dyn DepositStore>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        fedpeg_address::aggregate_federation_key(config.federation.pubkeys())?;

        let tracker = DepositTracker::open(store)?;
        let submitter = FederationSubmitter::new(
            config.federation.clone(),
            config.submitter.clone(),
            transport,
        );

        info!(
            network = %config.network,
            guardians = config.federation.guardians.len(),
            threshold = config.federation.threshold(),
            "peg-in client ready"
        );

        Ok(Self {
            config: Arc::new(config),
            tracker,
            submitter,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.submitter.transport()
    }

    /// Returns the deposit address for `claim_key` and starts tracking it.
    #[instrument(skip_all, fields(claim_pubkey = %claim_key.public_key()))]
    pub fn peg_in_address(&self, claim_key: &ClaimKey) -> Result<DepositAddress, ClientError> {
        let claim_pubkey = claim_key.public_key();
        let address = derive_deposit_address(&self.config, &claim_pubkey)?;
        self.tracker.create(&address, claim_pubkey)?;
        debug!(%address, "derived deposit address");
        Ok(address)
    }

    /// Validates a deposit to `claim_key`'s address and registers it with the federation.
    ///
    /// Nothing changes if validation fails. Once the submission has started, every failure is
    /// reflected in the deposit's state: rejection marks it `Rejected`, and a submission that
    /// timed out is reconciled with the federation before being rolled back to `Derived`. Dropping
    /// the returned future mid-submission also rolls the deposit back to `Derived`.
    #[instrument(skip_all, fields(claim_pubkey = %claim_key.public_key()))]
    pub async fn peg_in(
        &self,
        claim_key: &ClaimKey,
        proof: &[u8],
        tx: &[u8],
    ) -> Result<DepositId, ClientError> {
        let claim_pubkey = claim_key.public_key();
        let address = derive_deposit_address(&self.config, &claim_pubkey)?;
        self.tracker.create(&address, claim_pubkey)?;

        let validated = validate_pegin_proof(proof, tx, &address, &self.config).inspect_err(
            |err| warn!(%address, %err, "deposit proof failed validation"),
        )?;

        self.tracker.begin_submit(&address, validated.proof_hash())?;
        let guard = SubmissionGuard {
            tracker: &self.tracker,
            address: &address,
            settled: false,
        };
        info!(
            %address,
            proof_hash = %validated.proof_hash(),
            txid = %validated.txid(),
            amount = %validated.amount(),
            "submitting deposit"
        );

        let outcome = self.submit(&address, &validated, claim_key).await;
        guard.settle();
        outcome
    }

    /// Drives an in-flight submission to an outcome and records it.
    async fn submit(
        &self,
        address: &DepositAddress,
        validated: &ValidatedProof,
        claim_key: &ClaimKey,
    ) -> Result<DepositId, ClientError> {
        let proof_hash = validated.proof_hash();
        let claim_pubkey = claim_key.public_key();
        let submit_timeout = self.config.submitter.submit_timeout();
        let submission = timeout(
            submit_timeout,
            self.submitter.submit(validated, &claim_pubkey),
        )
        .await;

        match submission {
            Ok(Ok(deposit_id)) => {
                self.tracker.complete_submit(address, deposit_id)?;
                Ok(deposit_id)
            }
            Ok(Err(SubmitError::Rejected { reason })) => {
                self.tracker.reject_submit(address, reason.clone())?;
                Err(ClientError::Rejected { reason })
            }
            Ok(Err(err @ SubmitError::Timeout { .. })) => {
                self.reconcile(address, proof_hash, err.to_string()).await
            }
            Err(_) => {
                let fault = format!("no outcome within {submit_timeout:?}");
                self.reconcile(address, proof_hash, fault).await
            }
        }
    }

    async fn reconcile(
        &self,
        address: &DepositAddress,
        proof_hash: ProofHash,
        fault: String,
    ) -> Result<DepositId, ClientError> {
        warn!(%address, %fault, "submission outcome unknown, reconciling");

        match self.submitter.reconcile(proof_hash).await {
            Reconciliation::Known(deposit_id) => {
                self.tracker.complete_submit(address, deposit_id)?;
                Ok(deposit_id)
            }
            Reconciliation::Rejected { reason } => {
                self.tracker.reject_submit(address, reason.clone())?;
                Err(ClientError::Rejected { reason })
            }
            Reconciliation::Unknown => {
                self.tracker.revert_submit(address)?;
                Err(ClientError::SubmissionTimeout(fault))
            }
        }
    }

    /// Settles submissions a previous run left in flight, returning the deposits it updated.
    ///
    /// Each is reconciled with the federation: a known deposit becomes `Submitted`, a rejected one
    /// `Rejected`, and one the federation never saw goes back to `Derived`. Deposits it fails on
    /// stay in flight and are retried by the next call.
    #[instrument(skip_all)]
    pub async fn resume(&self) -> Result<Vec<PendingDeposit>, ClientError> {
        let mut settled = Vec::new();

        for address in self.tracker.interrupted() {
            let Some(proof_hash) = self.tracker.get(&address).and_then(|d| d.proof_hash()) else {
                continue;
            };

            let deposit = match self.submitter.reconcile(proof_hash).await {
                Reconciliation::Known(deposit_id) => {
                    self.tracker.complete_submit(&address, deposit_id)?
                }
                Reconciliation::Rejected { reason } => {
                    self.tracker.reject_submit(&address, reason)?
                }
                Reconciliation::Unknown => self.tracker.revert_submit(&address)?,
            };
            info!(%address, state = %deposit.state(), "settled interrupted submission");
            settled.push(deposit);
        }

        Ok(settled)
    }

    /// Asks the federation whether a submitted deposit has become final and records the answer.
    ///
    /// Deposits in any state other than `Submitted` are returned unchanged.
    #[instrument(skip(self))]
    pub async fn refresh_status(
        &self,
        address: &DepositAddress,
    ) -> Result<PendingDeposit, ClientError> {
        let deposit = self
            .tracker
            .get(address)
            .ok_or_else(|| TrackerError::UnknownDeposit(address.clone()))?;

        if deposit.state() != DepositState::Submitted {
            return Ok(deposit);
        }
        let Some(proof_hash) = deposit.proof_hash() else {
            return Ok(deposit);
        };

        let outcome = match self.submitter.status(proof_hash).await {
            FederationStatus::Confirmed(_) => Resolution::Confirmed,
            FederationStatus::Rejected { reason } => Resolution::Rejected { reason },
            FederationStatus::Accepted(_) | FederationStatus::Unknown => return Ok(deposit),
        };

        Ok(self.tracker.resolve(address, outcome)?)
    }

    pub fn deposit(&self, address: &DepositAddress) -> Option<PendingDeposit> {
        self.tracker.get(address)
    }

    /// Deposits that have not reached a final state.
    pub fn pending(&self) -> Vec<PendingDeposit> {
        self.tracker.pending()
    }

    /// Stops tracking a confirmed or rejected deposit.
    pub fn acknowledge(&self, address: &DepositAddress) -> Result<PendingDeposit, ClientError> {
        Ok(self.tracker.acknowledge(address)?)
    }

    /// Shuts the client down, handing back every deposit it still tracked.
    pub fn release(self) -> Vec<PendingDeposit> {
        let deposits = self.tracker.drain();
        info!(remaining = deposits.len(), "peg-in client released");
        deposits
    }
}

/// Rolls an in-flight submission back to `Derived` unless it was settled.
///
/// Armed once the tracker has accepted the submission, so a caller that drops [`PegInClient::peg_in`]
/// midway does not leave the deposit stuck in `Submitting`.
struct SubmissionGuard<'a> {
    tracker: &'a DepositTracker,
    address: &'a DepositAddress,
    settled: bool,
}

impl SubmissionGuard<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.tracker.revert_submit(self.address) {
            Ok(_) => warn!(address = %self.address, "submission cancelled, deposit rolled back"),
            Err(err) => {
                error!(address = %self.address, %err, "cannot roll back cancelled submission")
            }
        }
    }
}
