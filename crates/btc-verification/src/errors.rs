use thiserror::Error;

/// Reasons a deposit proof is not accepted.
///
/// Every variant is recoverable: the caller can retry with a corrected proof or transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The proof does not parse, its merkle branch does not commit to the header, or the header
    /// chain is invalid.
    #[error("malformed inclusion proof: {0}")]
    MalformedProof(String),

    /// The raw transaction does not decode.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The transaction is not the one the proof commits to, or does not pay the deposit address.
    #[error("transaction mismatch: {0}")]
    TransactionMismatch(String),

    /// The block holding the transaction is not buried deep enough yet.
    #[error("insufficient confirmations: required {required}, got {actual}")]
    InsufficientConfirmations { required: u32, actual: u32 },
}
