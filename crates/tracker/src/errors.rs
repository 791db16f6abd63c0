use std::io;

use fedpeg_primitives::DepositAddress;
use thiserror::Error;

use crate::DepositState;

/// Errors from deposit lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// No deposit was derived for the address, or it was already acknowledged.
    #[error("no deposit tracked for {0}")]
    UnknownDeposit(DepositAddress),

    /// A submission for the deposit is in flight or has already been accepted.
    #[error("deposit {address} is already {state}")]
    AlreadySubmitted {
        address: DepositAddress,
        state: DepositState,
    },

    /// The deposit's current state does not allow the requested move.
    #[error("invalid transition for deposit {address}: {from} -> {to}")]
    InvalidStateTransition {
        address: DepositAddress,
        from: DepositState,
        to: DepositState,
    },

    /// Only confirmed or rejected deposits can be acknowledged.
    #[error("deposit {address} is still {state}")]
    NotTerminal {
        address: DepositAddress,
        state: DepositState,
    },

    /// The deposit store refused the update; the deposit keeps its previous state.
    #[error("deposit store: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a [`DepositStore`](crate::DepositStore) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The underlying database failed to read or write.
    #[error("backend failure: {0}")]
    Backend(String),

    /// A stored record could not be decoded.
    #[error("corrupt deposit record: {0}")]
    Corrupt(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}
