//! Messages exchanged with guardians.

use bitcoin::{Amount, BlockHash, OutPoint, XOnlyPublicKey};
use fedpeg_btc_verification::ValidatedProof;
use fedpeg_primitives::{DepositId, ProofHash};
use serde::{Deserialize, Serialize};

/// Wire protocol version spoken by this client.
pub const PROTOCOL_VERSION: u16 = 1;

/// Request to register a proven deposit with a guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegInRequest {
    pub version: u16,
    pub proof_hash: ProofHash,
    pub claim_pubkey: XOnlyPublicKey,
    pub block_hash: BlockHash,
    pub outpoint: OutPoint,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,
    /// Inclusion proof as the caller supplied it.
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    /// Consensus-encoded deposit transaction.
    #[serde(with = "hex::serde")]
    pub tx: Vec<u8>,
}

impl PegInRequest {
    pub fn new(proof: &ValidatedProof, claim_pubkey: XOnlyPublicKey) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            proof_hash: proof.proof_hash(),
            claim_pubkey,
            block_hash: proof.block_hash(),
            outpoint: proof.outpoint(),
            amount: proof.amount(),
            proof: proof.raw_proof().to_vec(),
            tx: proof.raw_tx().to_vec(),
        }
    }
}

/// A guardian's answer to a [`PegInRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegInResponse {
    pub version: u16,
    #[serde(flatten)]
    pub outcome: PegInOutcome,
}

impl PegInResponse {
    pub fn accepted(deposit_id: DepositId) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            outcome: PegInOutcome::Accepted { deposit_id },
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            outcome: PegInOutcome::Rejected {
                reason: reason.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PegInOutcome {
    Accepted { deposit_id: DepositId },
    Rejected { reason: String },
}

/// A guardian's view of a previously submitted deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegInStatusResponse {
    pub version: u16,
    #[serde(flatten)]
    pub status: PegInStatus,
}

impl PegInStatusResponse {
    pub fn new(status: PegInStatus) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PegInStatus {
    /// The guardian has never seen the proof.
    Unknown,
    /// Accepted but not yet final.
    Accepted { deposit_id: DepositId },
    Confirmed { deposit_id: DepositId },
    Rejected { reason: String },
}
