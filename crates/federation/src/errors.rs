use fedpeg_primitives::GuardianId;
use jsonrpsee::core::ClientError;
use thiserror::Error;

/// Failure talking to a single guardian.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no endpoint configured for {0}")]
    UnknownGuardian(GuardianId),

    #[error("rpc call to {guardian} failed: {source}")]
    Rpc {
        guardian: GuardianId,
        #[source]
        source: ClientError,
    },

    #[error("{guardian} did not answer in time")]
    Timeout { guardian: GuardianId },

    #[error("{guardian} is unavailable: {reason}")]
    Unavailable { guardian: GuardianId, reason: String },
}

/// Outcome of a submission that did not produce a deposit id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Enough guardians rejected the deposit that a quorum can no longer accept it.
    #[error("rejected by federation: {reason}")]
    Rejected { reason: String },

    /// No quorum formed within the configured attempts.
    #[error("no federation quorum after {attempts} attempts: {last_fault}")]
    Timeout { attempts: u32, last_fault: String },
}

impl SubmitError {
    /// Whether the federation gave an authoritative answer.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
