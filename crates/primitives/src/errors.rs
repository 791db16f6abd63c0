//! Errors during parsing of primitive types.

use thiserror::Error;

/// Parsing errors for identifiers and key material.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The input does not have the expected number of bytes.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The input is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The supplied secret key is not a valid secp256k1 scalar.
    #[error("supplied key is invalid")]
    InvalidKey(#[from] secp256k1::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_error_is_comparable() {
        let err: ParseError = hex::FromHexError::OddLength.into();
        assert_eq!(err, ParseError::InvalidHex(hex::FromHexError::OddLength));
        assert_ne!(
            err,
            ParseError::InvalidLength {
                expected: 32,
                actual: 1
            }
        );
    }
}
