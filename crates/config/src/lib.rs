//! Configuration consumed by the peg-in client.
//!
//! The client never reads files itself: an external collaborator hands over a [`ClientConfig`]
//! (or the JSON it was serialized to) and the client treats it as an immutable value after
//! [`ClientConfig::validate`] succeeds.

mod config;
mod errors;
mod federation;
mod submitter;

pub use config::*;
pub use errors::*;
pub use federation::*;
pub use submitter::*;
