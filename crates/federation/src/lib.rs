//! Client side of the federation peg-in protocol.
//!
//! [`FederationSubmitter`] fans a validated deposit out to every guardian through a
//! [`FederationTransport`] and turns their answers into a single outcome: a [`DepositId`] once
//! `threshold` guardians agree on it, or a rejection once enough guardians refuse that no quorum can
//! form. Everything in between is retried.
//!
//! [`DepositId`]: fedpeg_primitives::DepositId

pub mod api;
mod errors;
mod quorum;
mod submitter;
mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use errors::{SubmitError, TransportError};
pub use quorum::FederationStatus;
pub use submitter::{FederationSubmitter, Reconciliation};
#[cfg(any(test, feature = "test-utils"))]
pub use transport::MockFederationTransport;
pub use transport::{FederationTransport, RpcTransport};
