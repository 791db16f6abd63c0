//! Logging subsystem.

pub mod manager;
pub mod types;


pub use manager::{LoggingError, build_filter, init};
pub use types::{FileLoggingConfig, LoggerConfig, StdoutConfig};

// Re-export tracing-appender types for convenience
pub use tracing_appender::rolling::Rotation;
