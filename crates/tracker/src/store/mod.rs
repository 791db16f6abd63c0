//! Persistence of tracked deposits.
//!
//! The tracker writes every state change through a [`DepositStore`] before applying it in memory,
//! so a restarted client resumes with the deposits it had handed out, including submissions whose
//! outcome it never saw.

mod memory;
mod sled_db;

use std::fmt;

use bitcoin::{Address, Network, Script, XOnlyPublicKey, address::NetworkUnchecked};
use fedpeg_primitives::{DepositAddress, DepositId, ProofHash};
use serde::{Deserialize, Serialize};

pub use memory::MemoryDepositStore;
pub use sled_db::SledDepositStore;

use crate::{DepositState, PendingDeposit, StoreError};

/// Durable backend of a [`DepositTracker`](crate::DepositTracker).
pub trait DepositStore: fmt::Debug + Send + Sync {
    /// Returns every stored deposit.
    fn load(&self) -> Result<Vec<PendingDeposit>, StoreError>;

    /// Inserts or replaces the record of `deposit`.
    fn put(&self, deposit: &PendingDeposit) -> Result<(), StoreError>;

    /// Deletes the record keyed by `script_pubkey`, if any.
    fn remove(&self, script_pubkey: &Script) -> Result<(), StoreError>;
}

/// Serialized form of a [`PendingDeposit`].
#[derive(Debug, Serialize, Deserialize)]
struct DepositRecord {
    address: String,
    claim_pubkey: XOnlyPublicKey,
    state: DepositState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proof_hash: Option<ProofHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deposit_id: Option<DepositId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rejection: Option<String>,
}

impl DepositRecord {
    fn encode(deposit: &PendingDeposit) -> Result<Vec<u8>, StoreError> {
        let record = Self {
            address: deposit.address.to_string(),
            claim_pubkey: deposit.claim_pubkey,
            state: deposit.state,
            proof_hash: deposit.proof_hash,
            deposit_id: deposit.deposit_id,
            rejection: deposit.rejection.clone(),
        };
        Ok(serde_json::to_vec(&record)?)
    }

    /// Decodes a record, refusing addresses of another network.
    fn decode(bytes: &[u8], network: Network) -> Result<PendingDeposit, StoreError> {
        let record: Self = serde_json::from_slice(bytes)?;
        let address = record
            .address
            .parse::<Address<NetworkUnchecked>>()
            .and_then(|address| address.require_network(network))
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", record.address)))?;

        Ok(PendingDeposit {
            address: DepositAddress::new(address),
            claim_pubkey: record.claim_pubkey,
            state: record.state,
            proof_hash: record.proof_hash,
            deposit_id: record.deposit_id,
            rejection: record.rejection,
        })
    }
}
