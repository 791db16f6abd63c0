//! Lifecycle tracking of deposits the client has handed out addresses for.
//!
//! State lives in memory and is written through to a [`DepositStore`]: the in-memory store for
//! short-lived clients, or sled when deposits have to survive a restart.

mod deposit;
mod errors;
mod store;
mod tracker;

pub use deposit::{DepositState, PendingDeposit, Resolution};
pub use errors::{StoreError, TrackerError};
pub use store::{DepositStore, MemoryDepositStore, SledDepositStore};
pub use tracker::DepositTracker;
