use std::path::PathBuf;

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, FederationConfig, SubmitterConfig};

/// Default number of confirmations a deposit needs before the federation accepts it.
const DEFAULT_MIN_CONFIRMATIONS: u32 = 6;

/// Default number of blocks after which the depositor may take back an unprocessed deposit.
const DEFAULT_RECOVERY_DELAY: u16 = 1008;

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bitcoin network deposits are made on.
    pub network: Network,

    pub federation: FederationConfig,

    #[serde(default)]
    pub pegin: PegInParams,

    #[serde(default)]
    pub submitter: SubmitterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl ClientConfig {
    pub fn new(network: Network, federation: FederationConfig) -> Self {
        Self {
            network,
            federation,
            pegin: PegInParams::default(),
            submitter: SubmitterConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// Deserializes and validates a config from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the config for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.federation.validate()?;

        if self.pegin.min_confirmations == 0 {
            return Err(ConfigError::InvalidPegInParam(
                "min_confirmations must be at least 1",
            ));
        }
        if self.pegin.recovery_delay == 0 {
            return Err(ConfigError::InvalidPegInParam(
                "recovery_delay must be at least 1",
            ));
        }

        let submitter = &self.submitter;
        if submitter.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidSubmitterParam(
                "max_attempts must be at least 1",
            ));
        }
        if !(submitter.retry.multiplier >= 1.0) {
            return Err(ConfigError::InvalidSubmitterParam(
                "multiplier must be at least 1.0",
            ));
        }
        if submitter.request_timeout_ms == 0 || submitter.submit_timeout_ms == 0 {
            return Err(ConfigError::InvalidSubmitterParam("timeouts must be non-zero"));
        }

        Ok(())
    }
}

/// Consensus parameters the federation applies to peg-ins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegInParams {
    /// Minimum depth of the block including the deposit, counting that block itself.
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u32,

    /// Relative timelock (in blocks) of the depositor's takeback path.
    #[serde(default = "default_recovery_delay")]
    pub recovery_delay: u16,
}

impl Default for PegInParams {
    fn default() -> Self {
        Self {
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            recovery_delay: DEFAULT_RECOVERY_DELAY,
        }
    }
}

fn default_min_confirmations() -> u32 {
    DEFAULT_MIN_CONFIRMATIONS
}

fn default_recovery_delay() -> u16 {
    DEFAULT_RECOVERY_DELAY
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Filter directives applied when `RUST_LOG` is unset (e.g. "info,fedpeg_federation=debug").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Use JSON format instead of compact format.
    #[serde(default)]
    pub json_format: bool,

    /// Directory for rotating log files; stdout only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Where the client keeps deposit state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Directory of the deposit database. Deposits only live in memory when unset, and are lost
    /// when the client goes away.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}
