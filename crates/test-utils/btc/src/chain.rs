use bitcoin::{
    Amount, Block, BlockHash, CompactTarget, MerkleBlock, OutPoint, Script, ScriptBuf, Sequence,
    Transaction, TxIn, TxMerkleNode, TxOut, Txid, Witness,
    absolute::LockTime,
    block::{Header, Version as BlockVersion},
    consensus,
    hashes::Hash,
    merkle_tree,
    opcodes::all::OP_RETURN,
    script::Builder,
    transaction::Version,
};

/// Regtest proof-of-work limit. Roughly every other nonce meets it.
pub fn regtest_bits() -> CompactTarget {
    CompactTarget::from_consensus(0x207f_ffff)
}

/// Value of the change output in transactions built here.
const CHANGE_VALUE: Amount = Amount::from_sat(5_000);

fn input_from(seed: u8) -> TxIn {
    TxIn {
        previous_output: OutPoint::new(Txid::from_byte_array([seed; 32]), 0),
        script_sig: ScriptBuf::new(),
        sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
        witness: Witness::new(),
    }
}

/// Builds a transaction paying `amount` to `script_pubkey` at output index 1.
///
/// Output 0 is an unrelated change output, so callers exercise the output search.
pub fn deposit_tx(script_pubkey: &Script, amount: Amount) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![input_from(0xde)],
        output: vec![
            TxOut {
                value: CHANGE_VALUE,
                script_pubkey: Builder::new()
                    .push_opcode(OP_RETURN)
                    .push_int(0xde)
                    .into_script(),
            },
            TxOut {
                value: amount,
                script_pubkey: script_pubkey.to_owned(),
            },
        ],
    }
}

/// Builds an unrelated transaction, distinct for every `seed`.
pub fn filler_tx(seed: u8) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![input_from(seed)],
        output: vec![TxOut {
            value: CHANGE_VALUE,
            script_pubkey: Builder::new()
                .push_opcode(OP_RETURN)
                .push_int(seed as i64)
                .into_script(),
        }],
    }
}

/// Grinds the nonce of a regtest header until it meets its own target.
pub fn mine_header(prev_blockhash: BlockHash, merkle_root: TxMerkleNode, time: u32) -> Header {
    let mut header = Header {
        version: BlockVersion::from_consensus(0x2000_0000),
        prev_blockhash,
        merkle_root,
        time,
        bits: regtest_bits(),
        nonce: 0,
    };
    while header.validate_pow(header.target()).is_err() {
        header.nonce += 1;
    }
    header
}

/// A block containing a target transaction, its partial merkle proof and the headers mined on top
/// of it.
#[derive(Debug, Clone)]
pub struct ProofFixture {
    pub block: Block,
    pub merkle_block: MerkleBlock,
    pub confirming_headers: Vec<Header>,
}

impl ProofFixture {
    /// Mines a block containing `tx` among a few filler transactions, then `confirmations - 1`
    /// headers on top of it.
    pub fn new(tx: &Transaction, confirmations: u32) -> Self {
        let mut txdata: Vec<_> = (1..=3).map(filler_tx).collect();
        txdata.insert(2, tx.clone());

        let merkle_root = merkle_tree::calculate_root(
            txdata.iter().map(Transaction::compute_txid).map(Txid::to_raw_hash),
        )
        .map(TxMerkleNode::from_raw_hash)
        .expect("non-empty block");
        let block = Block {
            header: mine_header(BlockHash::all_zeros(), merkle_root, 1_700_000_000),
            txdata,
        };

        let txid = tx.compute_txid();
        let txids: Vec<_> = block.txdata.iter().map(Transaction::compute_txid).collect();
        let merkle_block =
            MerkleBlock::from_header_txids_with_predicate(&block.header, &txids, |t| *t == txid);

        let mut confirming_headers: Vec<Header> = Vec::new();
        let mut prev = block.header;
        for i in 1..confirmations {
            let next = mine_header(
                prev.block_hash(),
                TxMerkleNode::from_byte_array([i as u8; 32]),
                prev.time + 600,
            );
            confirming_headers.push(next);
            prev = next;
        }

        Self {
            block,
            merkle_block,
            confirming_headers,
        }
    }

    pub fn block_hash(&self) -> BlockHash {
        self.block.block_hash()
    }

    /// Serializes the proof: the merkle block followed by the confirming headers, if any.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = consensus::serialize(&self.merkle_block);
        if !self.confirming_headers.is_empty() {
            bytes.extend(consensus::serialize(&self.confirming_headers));
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_headers_chain() {
        let fixture = ProofFixture::new(&filler_tx(9), 4);

        assert_eq!(fixture.confirming_headers.len(), 3);
        let mut prev = fixture.block_hash();
        for header in &fixture.confirming_headers {
            assert_eq!(header.prev_blockhash, prev);
            header.validate_pow(header.target()).unwrap();
            prev = header.block_hash();
        }
    }

    #[test]
    fn test_merkle_block_matches_target() {
        let tx = filler_tx(9);
        let fixture = ProofFixture::new(&tx, 1);

        let mut matches = Vec::new();
        let mut indexes = Vec::new();
        let root = fixture
            .merkle_block
            .txn
            .extract_matches(&mut matches, &mut indexes)
            .unwrap();

        assert_eq!(root, fixture.block.header.merkle_root);
        assert_eq!(matches, vec![tx.compute_txid()]);
    }
}
