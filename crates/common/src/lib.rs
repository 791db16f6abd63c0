//! Ambient utilities shared by the peg-in client crates.

pub mod logging;
