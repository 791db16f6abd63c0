use thiserror::Error;

/// Errors deriving a deposit address. All of them mean the federation key set in the config is
/// unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The federation has no keys to aggregate.
    #[error("federation key set is empty")]
    EmptyFederation,

    /// The same key appears twice in the federation key set.
    #[error("federation key at index {index} is a duplicate")]
    DuplicateKey { index: usize },

    /// MuSig2 key aggregation failed.
    #[error("key aggregation failed: {reason}")]
    KeyAggregation { reason: String },

    /// The takeback tapscript could not be committed to.
    #[error("taproot construction failed: {reason}")]
    Taproot { reason: String },
}
