//! Deterministic federations, transactions and inclusion proofs for tests.

mod chain;
mod federation;

pub use chain::{ProofFixture, deposit_tx, filler_tx, mine_header, regtest_bits};
pub use federation::{TestFederation, claim_key};
