use fedpeg_address::AddressError;
use fedpeg_btc_verification::ValidationError;
use fedpeg_config::ConfigError;
use fedpeg_federation::TransportError;
use fedpeg_tracker::{StoreError, TrackerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The federation key set cannot produce deposit addresses.
    #[error("invalid federation keys: {0}")]
    FederationKeys(#[from] AddressError),

    /// A guardian endpoint could not be set up.
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// The deposit store under `storage.data_dir` could not be opened.
    #[error("cannot open deposit store: {0}")]
    Storage(#[from] StoreError),

    #[error("rejected by federation: {reason}")]
    Rejected { reason: String },

    /// The federation neither accepted nor rejected the deposit in time. The deposit is back in
    /// `Derived` and may be submitted again.
    #[error("submission timed out: {0}")]
    SubmissionTimeout(String),
}

impl ClientError {
    /// Whether retrying, possibly with corrected input, can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::SubmissionTimeout(_))
    }
}
