use std::fmt;

use bitcoin::XOnlyPublicKey;
use fedpeg_primitives::{DepositAddress, DepositId, ProofHash};
use serde::{Deserialize, Serialize};

/// Lifecycle of a deposit.
///
/// ```text
/// Derived -> Submitting -> Submitted -> Confirmed
///               |              |
///               +-> Rejected <-+
/// ```
///
/// A timed-out submission that the federation does not know about rolls back from `Submitting` to
/// `Derived`. No other transition goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositState {
    /// Address handed out, nothing submitted yet.
    Derived,
    /// A submission is in flight.
    Submitting,
    /// The federation accepted the deposit and assigned it an id.
    Submitted,
    Confirmed,
    Rejected,
}

impl DepositState {
    /// Whether the deposit can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

impl fmt::Display for DepositState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Derived => "derived",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Final outcome of a submitted deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Confirmed,
    Rejected { reason: String },
}

/// A deposit tracked from address derivation until the caller acknowledges its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeposit {
    pub(crate) address: DepositAddress,
    pub(crate) claim_pubkey: XOnlyPublicKey,
    pub(crate) state: DepositState,
    pub(crate) proof_hash: Option<ProofHash>,
    pub(crate) deposit_id: Option<DepositId>,
    pub(crate) rejection: Option<String>,
}

impl PendingDeposit {
    pub(crate) fn new(address: DepositAddress, claim_pubkey: XOnlyPublicKey) -> Self {
        Self {
            address,
            claim_pubkey,
            state: DepositState::Derived,
            proof_hash: None,
            deposit_id: None,
            rejection: None,
        }
    }

    pub fn address(&self) -> &DepositAddress {
        &self.address
    }

    pub fn claim_pubkey(&self) -> &XOnlyPublicKey {
        &self.claim_pubkey
    }

    pub fn state(&self) -> DepositState {
        self.state
    }

    /// Hash of the proof submitted for this deposit, once a submission has started.
    pub fn proof_hash(&self) -> Option<ProofHash> {
        self.proof_hash
    }

    /// Id assigned by the federation, once accepted.
    pub fn deposit_id(&self) -> Option<DepositId> {
        self.deposit_id
    }

    /// Reason given by the federation for rejecting the deposit.
    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }
}
