//! Peg-in client for a federated Bitcoin custody.
//!
//! A depositor asks [`PegInClient::peg_in_address`] for an address bound to their claim key, pays
//! it on Bitcoin, and hands the transaction plus an inclusion proof to [`PegInClient::peg_in`].
//! The client checks the proof locally, submits it to the federation and tracks the deposit until
//! the caller acknowledges its outcome.

mod client;
mod errors;

pub use client::PegInClient;
pub use errors::ClientError;
pub use fedpeg_config::ClientConfig;
pub use fedpeg_primitives::{ClaimKey, DepositAddress, DepositId};
pub use fedpeg_tracker::{DepositState, PendingDeposit};

// Consume dev dependencies used only by the integration tests.
#[cfg(test)]
use bitcoin as _;
use fedpeg_common::logging::{self, LoggerConfig, LoggingError};
#[cfg(test)]
use tempfile as _;

/// Installs the global tracing subscriber described by `config.logging`.
pub fn init_logging(config: &ClientConfig) -> Result<(), LoggingError> {
    logging::init(LoggerConfig::from_client_config(
        "fedpeg-client".to_string(),
        &config.logging,
    ))
}
