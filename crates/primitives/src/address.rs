use std::fmt;

use bitcoin::{Address, Script, ScriptBuf};

/// A federation deposit address bound to a claim key.
///
/// Keeps the locking script alongside the address since matching transaction outputs against it
/// is the common operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepositAddress {
    address: Address,
    script_pubkey: ScriptBuf,
}

impl DepositAddress {
    pub fn new(address: Address) -> Self {
        let script_pubkey = address.script_pubkey();
        Self {
            address,
            script_pubkey,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn script_pubkey(&self) -> &Script {
        &self.script_pubkey
    }
}

impl fmt::Display for DepositAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.address, f)
    }
}
