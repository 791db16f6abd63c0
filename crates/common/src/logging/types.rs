//! Configuration types for the logging subsystem.

use std::path::PathBuf;

use fedpeg_config::LoggingConfig;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::FmtSpan;

/// Configuration for the stdout logging layer
#[derive(Debug, Clone)]
pub struct StdoutConfig {
    /// Use JSON format instead of compact format
    pub json_format: bool,
    /// Span events to log (ENTER, EXIT, CLOSE, etc.)
    pub fmt_span: FmtSpan,
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            // Log CLOSE events to capture span duration
            fmt_span: FmtSpan::CLOSE,
        }
    }
}

/// Configuration for file-based logging with rotation
#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    /// Directory where log files will be written
    pub directory: PathBuf,
    /// Base filename prefix (e.g., "fedpeg" -> "fedpeg.2026-01-01")
    pub file_name_prefix: String,
    /// Rotation strategy
    pub rotation: Rotation,
    /// Use JSON format for file logs
    pub json_format: bool,
}

impl FileLoggingConfig {
    pub fn new(directory: PathBuf, file_name_prefix: String) -> Self {
        Self {
            directory,
            file_name_prefix,
            rotation: Rotation::DAILY,
            json_format: false,
        }
    }

    pub fn with_json_format(mut self, json_format: bool) -> Self {
        self.json_format = json_format;
        self
    }
}

/// Main logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Name reported in the startup log line and used as the log file prefix
    pub service_name: String,
    /// Filter directives used when `RUST_LOG` is unset
    pub default_filter: Option<String>,
    /// Stdout logging configuration
    pub stdout_config: StdoutConfig,
    /// File logging configuration (optional)
    pub file_logging_config: Option<FileLoggingConfig>,
}

impl LoggerConfig {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            default_filter: None,
            stdout_config: StdoutConfig::default(),
            file_logging_config: None,
        }
    }

    /// Builds a logger config from the client's serialized logging section.
    pub fn from_client_config(service_name: String, config: &LoggingConfig) -> Self {
        let mut lconfig = Self::new(service_name.clone()).with_json_logging(config.json_format);
        lconfig.default_filter = config.filter.clone();

        if let Some(dir) = &config.log_dir {
            lconfig = lconfig.with_file_logging(
                FileLoggingConfig::new(dir.clone(), service_name)
                    .with_json_format(config.json_format),
            );
        }

        lconfig
    }

    /// Set the fallback filter directives
    pub fn with_default_filter(mut self, filter: String) -> Self {
        self.default_filter = Some(filter);
        self
    }

    /// Enable JSON logging format
    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.stdout_config.json_format = enabled;
        self
    }

    /// Enable file logging with configuration
    pub fn with_file_logging(mut self, config: FileLoggingConfig) -> Self {
        self.file_logging_config = Some(config);
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new("fedpeg".to_string())
    }
}
