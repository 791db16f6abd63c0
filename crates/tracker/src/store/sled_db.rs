use std::{fmt, fs, path::Path};

use bitcoin::{Network, Script};
use sled::{Db, Tree};
use tracing::*;

use super::{DepositRecord, DepositStore};
use crate::{PendingDeposit, StoreError};

/// Name of the tree holding deposit records, keyed by deposit script.
const DEPOSITS_TREE: &str = "deposits";

/// Deposit store backed by a sled database.
///
/// Every write is flushed before it returns, so an acknowledged state change survives a crash.
#[derive(Clone)]
pub struct SledDepositStore {
    tree: Tree,
    network: Network,
}

impl SledDepositStore {
    /// Opens (creating if needed) the database in `data_dir`.
    pub fn open(data_dir: &Path, network: Network) -> Result<Self, StoreError> {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir)?;
        }
        let db = sled::open(data_dir)?;
        Self::new(&db, network)
    }

    /// Uses the deposit tree of an already open database.
    pub fn new(db: &Db, network: Network) -> Result<Self, StoreError> {
        Ok(Self {
            tree: db.open_tree(DEPOSITS_TREE)?,
            network,
        })
    }
}

impl fmt::Debug for SledDepositStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledDepositStore")
            .field("network", &self.network)
            .field("records", &self.tree.len())
            .finish()
    }
}

impl DepositStore for SledDepositStore {
    fn load(&self) -> Result<Vec<PendingDeposit>, StoreError> {
        self.tree
            .iter()
            .values()
            .map(|value| DepositRecord::decode(&value?, self.network))
            .collect()
    }

    fn put(&self, deposit: &PendingDeposit) -> Result<(), StoreError> {
        let value = DepositRecord::encode(deposit)?;
        self.tree
            .insert(deposit.address.script_pubkey().as_bytes(), value)?;
        self.tree.flush()?;
        trace!(address = %deposit.address, state = %deposit.state, "stored deposit");
        Ok(())
    }

    fn remove(&self, script_pubkey: &Script) -> Result<(), StoreError> {
        self.tree.remove(script_pubkey.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }
}
