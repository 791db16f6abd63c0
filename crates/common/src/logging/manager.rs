//! Logging initialization.

use std::env;

use thiserror::Error;
use tracing::*;
use tracing_appender::rolling::{InitError, RollingFileAppender};
use tracing_subscriber::{
    EnvFilter, Layer, filter::ParseError, fmt::layer, layer::SubscriberExt, registry,
    util::{SubscriberInitExt, TryInitError},
};

use super::types::LoggerConfig;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid filter directives: {0}")]
    InvalidFilter(#[from] ParseError),

    #[error("cannot open log file: {0}")]
    FileAppender(#[from] InitError),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Builds the level filter.
///
/// `RUST_LOG` always wins; otherwise the configured directives apply, falling back to INFO.
pub fn build_filter(default_filter: Option<&str>) -> Result<EnvFilter, ParseError> {
    let builder = EnvFilter::builder().with_default_directive(Level::INFO.into());

    match (env::var(EnvFilter::DEFAULT_ENV), default_filter) {
        (Err(_), Some(directives)) => builder.parse(directives),
        _ => Ok(builder.from_env_lossy()),
    }
}

/// Initializes the logging subsystem with the provided config.
pub fn init(config: LoggerConfig) -> Result<(), LoggingError> {
    let filt = build_filter(config.default_filter.as_deref())?;

    // Configure stdout logging with JSON or compact format
    let stdout_sub = if config.stdout_config.json_format {
        layer()
            .json()
            .with_span_events(config.stdout_config.fmt_span.clone())
            .with_filter(filt.clone())
            .boxed()
    } else {
        layer()
            .compact()
            .with_span_events(config.stdout_config.fmt_span.clone())
            .with_filter(filt.clone())
            .boxed()
    };

    // Build optional file logging layer
    let file_layer = match &config.file_logging_config {
        Some(file_config) => {
            let file_appender = RollingFileAppender::builder()
                .rotation(file_config.rotation.clone())
                .filename_prefix(&file_config.file_name_prefix)
                .build(&file_config.directory)?;

            let file_layer = if file_config.json_format {
                layer()
                    .json()
                    .with_writer(file_appender)
                    .with_ansi(false) // No color codes in files
                    .with_filter(filt.clone())
                    .boxed()
            } else {
                layer()
                    .compact()
                    .with_writer(file_appender)
                    .with_ansi(false) // No color codes in files
                    .with_filter(filt.clone())
                    .boxed()
            };
            Some(file_layer)
        }
        None => None,
    };

    registry()
        .with(stdout_sub)
        .with(file_layer)
        .try_init()?;

    info!(
        service_name = %config.service_name,
        file_logging = config.file_logging_config.is_some(),
        "logging initialized"
    );

    Ok(())
}
