//! Local verification of Bitcoin deposit inclusion proofs.

mod errors;
mod proof;
mod validation;

pub use errors::ValidationError;
pub use proof::InclusionProof;
pub use validation::{ValidatedProof, validate_pegin_proof};
