//! An in-memory federation with scriptable guardians.

use std::{
    collections::{HashMap, HashSet},
    future,
    time::Duration,
};

use async_trait::async_trait;
use fedpeg_config::FederationConfig;
use fedpeg_primitives::{DepositId, GuardianId, ProofHash, hash::sha256_concat};
use parking_lot::Mutex;
use tokio::time::sleep;

use crate::{
    FederationTransport, TransportError,
    types::{
        PROTOCOL_VERSION, PegInRequest, PegInResponse, PegInStatus, PegInStatusResponse,
    },
};

/// How a fake guardian answers submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardianBehavior {
    /// Accepts with the id every honest guardian assigns, see [`expected_deposit_id`].
    Accept,
    /// Accepts under an id of its own choosing.
    AcceptWith(DepositId),
    /// Registers the deposit right away but answers only after the delay.
    AcceptSlowly(Duration),
    Reject(String),
    /// Fails every request.
    Unreachable,
    /// Never answers.
    Stall,
    /// Accepts, but speaks an unsupported protocol version.
    WrongVersion,
}

/// Deposit id honest guardians assign to a proof.
pub fn expected_deposit_id(proof_hash: &ProofHash) -> DepositId {
    DepositId::new(sha256_concat(&[b"fake-federation", proof_hash.as_bytes()]))
}

#[derive(Debug)]
struct FakeGuardian {
    behavior: GuardianBehavior,
    failures_left: u32,
    submissions: u32,
    accepted: HashMap<ProofHash, DepositId>,
    rejected: HashMap<ProofHash, String>,
    confirmed: HashSet<ProofHash>,
}

impl FakeGuardian {
    fn new() -> Self {
        Self {
            behavior: GuardianBehavior::Accept,
            failures_left: 0,
            submissions: 0,
            accepted: HashMap::new(),
            rejected: HashMap::new(),
            confirmed: HashSet::new(),
        }
    }
}

/// [`FederationTransport`] backed by in-memory guardians that remember what they were sent.
#[derive(Debug)]
pub struct FakeFederation {
    guardians: Mutex<HashMap<GuardianId, FakeGuardian>>,
}

impl FakeFederation {
    /// Creates a federation where every configured guardian accepts.
    pub fn new(federation: &FederationConfig) -> Self {
        let guardians = federation
            .guardians
            .iter()
            .map(|g| (g.id, FakeGuardian::new()))
            .collect();
        Self {
            guardians: Mutex::new(guardians),
        }
    }

    pub fn set_behavior(&self, guardian: GuardianId, behavior: GuardianBehavior) {
        if let Some(g) = self.guardians.lock().get_mut(&guardian) {
            g.behavior = behavior;
        }
    }

    pub fn set_all(&self, behavior: GuardianBehavior) {
        for g in self.guardians.lock().values_mut() {
            g.behavior = behavior.clone();
        }
    }

    /// Makes the next `count` requests to `guardian` fail before its behavior applies.
    pub fn fail_next(&self, guardian: GuardianId, count: u32) {
        if let Some(g) = self.guardians.lock().get_mut(&guardian) {
            g.failures_left = count;
        }
    }

    /// Marks `proof_hash` as final on every guardian that accepted it.
    pub fn confirm(&self, proof_hash: &ProofHash) {
        for g in self.guardians.lock().values_mut() {
            if g.accepted.contains_key(proof_hash) {
                g.confirmed.insert(*proof_hash);
            }
        }
    }

    /// Revokes an accepted deposit on every guardian.
    pub fn revoke(&self, proof_hash: &ProofHash, reason: &str) {
        for g in self.guardians.lock().values_mut() {
            if g.accepted.remove(proof_hash).is_some() {
                g.confirmed.remove(proof_hash);
                g.rejected.insert(*proof_hash, reason.to_string());
            }
        }
    }

    /// Number of submissions `guardian` received, including failed ones.
    pub fn submissions(&self, guardian: GuardianId) -> u32 {
        self.guardians
            .lock()
            .get(&guardian)
            .map_or(0, |g| g.submissions)
    }

    pub fn total_submissions(&self) -> u32 {
        self.guardians.lock().values().map(|g| g.submissions).sum()
    }
}

enum Reply {
    Now(PegInResponse),
    After(Duration, PegInResponse),
    Never,
}

#[async_trait]
impl FederationTransport for FakeFederation {
    async fn submit_peg_in(
        &self,
        guardian: GuardianId,
        request: PegInRequest,
    ) -> Result<PegInResponse, TransportError> {
        let reply = {
            let mut guardians = self.guardians.lock();
            let g = guardians
                .get_mut(&guardian)
                .ok_or(TransportError::UnknownGuardian(guardian))?;
            g.submissions += 1;

            if g.failures_left > 0 {
                g.failures_left -= 1;
                return Err(TransportError::Unavailable {
                    guardian,
                    reason: "injected failure".to_string(),
                });
            }

            let proof_hash = request.proof_hash;
            if let Some(reason) = g.rejected.get(&proof_hash) {
                Reply::Now(PegInResponse::rejected(reason.clone()))
            } else if let Some(id) = g.accepted.get(&proof_hash) {
                Reply::Now(PegInResponse::accepted(*id))
            } else {
                match &g.behavior {
                    GuardianBehavior::Accept => {
                        let id = expected_deposit_id(&proof_hash);
                        g.accepted.insert(proof_hash, id);
                        Reply::Now(PegInResponse::accepted(id))
                    }
                    GuardianBehavior::AcceptWith(id) => {
                        g.accepted.insert(proof_hash, *id);
                        Reply::Now(PegInResponse::accepted(*id))
                    }
                    GuardianBehavior::AcceptSlowly(delay) => {
                        let id = expected_deposit_id(&proof_hash);
                        g.accepted.insert(proof_hash, id);
                        Reply::After(*delay, PegInResponse::accepted(id))
                    }
                    GuardianBehavior::Reject(reason) => {
                        g.rejected.insert(proof_hash, reason.clone());
                        Reply::Now(PegInResponse::rejected(reason.clone()))
                    }
                    GuardianBehavior::Unreachable => {
                        return Err(TransportError::Unavailable {
                            guardian,
                            reason: "connection refused".to_string(),
                        });
                    }
                    GuardianBehavior::Stall => Reply::Never,
                    GuardianBehavior::WrongVersion => {
                        let mut response =
                            PegInResponse::accepted(expected_deposit_id(&proof_hash));
                        response.version = PROTOCOL_VERSION + 1;
                        Reply::Now(response)
                    }
                }
            }
        };

        match reply {
            Reply::Now(response) => Ok(response),
            Reply::After(delay, response) => {
                sleep(delay).await;
                Ok(response)
            }
            Reply::Never => future::pending().await,
        }
    }

    async fn peg_in_status(
        &self,
        guardian: GuardianId,
        proof_hash: ProofHash,
    ) -> Result<PegInStatusResponse, TransportError> {
        let guardians = self.guardians.lock();
        let g = guardians
            .get(&guardian)
            .ok_or(TransportError::UnknownGuardian(guardian))?;

        if g.behavior == GuardianBehavior::Unreachable {
            return Err(TransportError::Unavailable {
                guardian,
                reason: "connection refused".to_string(),
            });
        }

        let status = if let Some(reason) = g.rejected.get(&proof_hash) {
            PegInStatus::Rejected {
                reason: reason.clone(),
            }
        } else if let Some(id) = g.accepted.get(&proof_hash) {
            if g.confirmed.contains(&proof_hash) {
                PegInStatus::Confirmed { deposit_id: *id }
            } else {
                PegInStatus::Accepted { deposit_id: *id }
            }
        } else {
            PegInStatus::Unknown
        };

        Ok(PegInStatusResponse::new(status))
    }
}
