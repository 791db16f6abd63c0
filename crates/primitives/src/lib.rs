//! Primitive types shared by the peg-in client crates.

#[macro_use]
mod macros;

mod address;
mod claim;
mod errors;
pub mod hash;
mod ids;

pub use address::*;
pub use claim::*;
pub use errors::*;
pub use ids::*;
