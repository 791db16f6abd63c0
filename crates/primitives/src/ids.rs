use std::fmt;

use bitcoin::{BlockHash, OutPoint, hashes::Hash};
use serde::{Deserialize, Serialize};

use crate::hash::sha256_concat;

/// Identifier the federation assigns to an accepted deposit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepositId([u8; 32]);

impl_buf32!(DepositId);

/// Commitment to a proven deposit output.
///
/// Covers the block the output was proven in and the outpoint itself, so two encodings of a proof
/// for the same output (e.g. with a different number of confirming headers) share a hash. This is
/// the idempotency key for submissions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProofHash([u8; 32]);

impl_buf32!(ProofHash);

impl ProofHash {
    /// Domain separation tag prefixed to the hashed data.
    const TAG: &'static [u8] = b"fedpeg/proof-hash/v1";

    pub fn for_output(block_hash: &BlockHash, outpoint: &OutPoint) -> Self {
        Self(sha256_concat(&[
            Self::TAG,
            block_hash.as_byte_array(),
            outpoint.txid.as_byte_array(),
            &outpoint.vout.to_le_bytes(),
        ]))
    }
}

/// Index of a guardian within the federation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuardianId(u16);

impl GuardianId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn inner(&self) -> u16 {
        self.0
    }
}

impl From<u16> for GuardianId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guardian-{}", self.0)
    }
}

impl fmt::Debug for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuardianId({})", self.0)
    }
}
