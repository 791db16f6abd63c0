use bitcoin::{Amount, BlockHash, OutPoint, Transaction, Txid, consensus};
use fedpeg_config::ClientConfig;
use fedpeg_primitives::{DepositAddress, ProofHash};

use crate::{InclusionProof, ValidationError};

/// A deposit proof that passed every local check.
///
/// Only [`validate_pegin_proof`] produces these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProof {
    proof_hash: ProofHash,
    block_hash: BlockHash,
    outpoint: OutPoint,
    amount: Amount,
    confirmations: u32,
    raw_proof: Vec<u8>,
    raw_tx: Vec<u8>,
}

impl ValidatedProof {
    pub fn proof_hash(&self) -> ProofHash {
        self.proof_hash
    }

    pub fn block_hash(&self) -> BlockHash {
        self.block_hash
    }

    pub fn txid(&self) -> Txid {
        self.outpoint.txid
    }

    /// The output paying the deposit address.
    pub fn outpoint(&self) -> OutPoint {
        self.outpoint
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn confirmations(&self) -> u32 {
        self.confirmations
    }

    pub fn raw_proof(&self) -> &[u8] {
        &self.raw_proof
    }

    pub fn raw_tx(&self) -> &[u8] {
        &self.raw_tx
    }
}

/// Validates that `tx` pays `address` and is buried deep enough according to `proof`.
///
/// Checks run in a fixed order: proof structure and header chain, then the transaction's identity,
/// then the deposit output, then depth. The first failure is returned.
pub fn validate_pegin_proof(
    proof: &[u8],
    tx: &[u8],
    address: &DepositAddress,
    config: &ClientConfig,
) -> Result<ValidatedProof, ValidationError> {
    let inclusion = InclusionProof::from_bytes(proof)?;
    let matched_txid = inclusion.matched_txid()?;
    inclusion.verify_header_chain(config.network)?;

    let transaction: Transaction = consensus::deserialize(tx)
        .map_err(|e| ValidationError::MalformedTransaction(e.to_string()))?;
    let txid = transaction.compute_txid();
    if txid != matched_txid {
        return Err(ValidationError::TransactionMismatch(format!(
            "proof commits to {matched_txid}, transaction is {txid}"
        )));
    }

    let (vout, output) = transaction
        .output
        .iter()
        .enumerate()
        .find(|(_, out)| out.script_pubkey.as_script() == address.script_pubkey())
        .ok_or_else(|| {
            ValidationError::TransactionMismatch(format!("no output pays {address}"))
        })?;

    let required = config.pegin.min_confirmations;
    let actual = inclusion.confirmations();
    if actual < required {
        return Err(ValidationError::InsufficientConfirmations { required, actual });
    }

    let block_hash = inclusion.header().block_hash();
    let outpoint = OutPoint::new(txid, vout as u32);

    Ok(ValidatedProof {
        proof_hash: ProofHash::for_output(&block_hash, &outpoint),
        block_hash,
        outpoint,
        amount: output.value,
        confirmations: actual,
        raw_proof: proof.to_vec(),
        raw_tx: tx.to_vec(),
    })
}
