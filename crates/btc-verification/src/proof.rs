use std::iter;

use bitcoin::{
    MerkleBlock, Network, Txid,
    block::Header,
    consensus::{self, Params},
};

use crate::ValidationError;

/// A parsed inclusion proof.
///
/// The wire form is a consensus-encoded [`MerkleBlock`], as returned by `gettxoutproof`,
/// optionally followed by a consensus-encoded list of headers built on top of the proven block.
#[derive(Debug, Clone)]
pub struct InclusionProof {
    merkle_block: MerkleBlock,
    confirming_headers: Vec<Header>,
}

impl InclusionProof {
    /// Parses a proof, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let (merkle_block, consumed) = consensus::deserialize_partial::<MerkleBlock>(bytes)
            .map_err(|e| ValidationError::MalformedProof(format!("merkle block: {e}")))?;

        let rest = &bytes[consumed..];
        let confirming_headers = if rest.is_empty() {
            Vec::new()
        } else {
            consensus::deserialize::<Vec<Header>>(rest).map_err(|e| {
                ValidationError::MalformedProof(format!("confirming headers: {e}"))
            })?
        };

        Ok(Self {
            merkle_block,
            confirming_headers,
        })
    }

    /// Header of the block containing the transaction.
    pub fn header(&self) -> &Header {
        &self.merkle_block.header
    }

    pub fn confirming_headers(&self) -> &[Header] {
        &self.confirming_headers
    }

    /// Depth of the proven block, counting the block itself.
    pub fn confirmations(&self) -> u32 {
        u32::try_from(self.confirming_headers.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    /// Returns the single transaction the merkle branch commits to.
    pub fn matched_txid(&self) -> Result<Txid, ValidationError> {
        let mut matches = Vec::new();
        let mut indexes = Vec::new();
        self.merkle_block
            .extract_matches(&mut matches, &mut indexes)
            .map_err(|e| ValidationError::MalformedProof(format!("merkle branch: {e}")))?;

        match matches.as_slice() {
            [txid] => Ok(*txid),
            other => Err(ValidationError::MalformedProof(format!(
                "expected exactly one matched transaction, found {}",
                other.len()
            ))),
        }
    }

    /// Checks proof of work of every header and that the confirming headers extend the proven
    /// block.
    pub fn verify_header_chain(&self, network: Network) -> Result<(), ValidationError> {
        let max_target = Params::new(network).max_attainable_target;

        let mut prev: Option<&Header> = None;
        for (depth, header) in iter::once(self.header())
            .chain(self.confirming_headers.iter())
            .enumerate()
        {
            if let Some(prev) = prev
                && header.prev_blockhash != prev.block_hash()
            {
                return Err(ValidationError::MalformedProof(format!(
                    "header at depth {depth} does not extend its predecessor"
                )));
            }

            let target = header.target();
            if target > max_target {
                return Err(ValidationError::MalformedProof(format!(
                    "header at depth {depth} has a target above the {network} limit"
                )));
            }
            header.validate_pow(target).map_err(|e| {
                ValidationError::MalformedProof(format!("header at depth {depth}: {e}"))
            })?;

            prev = Some(header);
        }

        Ok(())
    }
}
