use std::collections::HashMap;

use bitcoin::{Script, ScriptBuf};
use parking_lot::Mutex;

use super::DepositStore;
use crate::{PendingDeposit, StoreError};

/// Keeps deposits for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryDepositStore {
    deposits: Mutex<HashMap<ScriptBuf, PendingDeposit>>,
}

impl MemoryDepositStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DepositStore for MemoryDepositStore {
    fn load(&self) -> Result<Vec<PendingDeposit>, StoreError> {
        Ok(self.deposits.lock().values().cloned().collect())
    }

    fn put(&self, deposit: &PendingDeposit) -> Result<(), StoreError> {
        self.deposits
            .lock()
            .insert(deposit.address.script_pubkey().to_owned(), deposit.clone());
        Ok(())
    }

    fn remove(&self, script_pubkey: &Script) -> Result<(), StoreError> {
        self.deposits.lock().remove(script_pubkey);
        Ok(())
    }
}
