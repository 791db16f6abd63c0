use fedpeg_primitives::GuardianId;
use thiserror::Error;

/// Reasons a [`ClientConfig`](crate::ClientConfig) is rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config could not be deserialized.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The federation has no guardians.
    #[error("federation has no guardians")]
    NoGuardians,

    /// Two guardians share an id.
    #[error("duplicate guardian id {0}")]
    DuplicateGuardianId(GuardianId),

    /// Two guardians share a public key.
    #[error("guardian {0} reuses the public key of another guardian")]
    DuplicateGuardianKey(GuardianId),

    /// A guardian has no endpoint to talk to.
    #[error("guardian {0} has an empty endpoint")]
    EmptyEndpoint(GuardianId),

    /// The threshold is zero or exceeds the guardian count.
    #[error("invalid threshold {threshold}: must be between 1 and {guardians}")]
    InvalidThreshold { threshold: usize, guardians: usize },

    /// The peg-in parameters are unusable.
    #[error("invalid peg-in parameter: {0}")]
    InvalidPegInParam(&'static str),

    /// The submitter parameters are unusable.
    #[error("invalid submitter parameter: {0}")]
    InvalidSubmitterParam(&'static str),
}
