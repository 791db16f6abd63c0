use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum number of submission rounds.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, in ms.
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Default exponential backoff multiplier.
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default backoff cap, in ms.
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Default timeout of a single guardian request, in ms.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default overall timeout of a peg-in submission, in ms.
const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 60_000;

/// Default window during which submissions of the same proof are deduplicated, in secs.
const DEFAULT_DEDUP_WINDOW_SECS: u64 = 600;

/// Retry policy for transient submission failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in ms.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiplier for each subsequent retry.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum delay between attempts, in ms.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Calculates the delay to wait after the failed attempt `retry_count` (0-indexed).
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::from_millis(self.base_delay_ms);
        }

        let delay = self.base_delay_ms as f64 * self.multiplier.powi(retry_count as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// Checks whether another attempt may follow `attempts` completed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Parameters of the federation submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitterConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Timeout of a single request to a single guardian, in ms.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Overall bound on a peg-in submission, in ms. When it elapses the client reconciles with
    /// the federation.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// How long a finished submission is remembered for deduplication, in secs.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            submit_timeout_ms: DEFAULT_SUBMIT_TIMEOUT_MS,
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
        }
    }
}

impl SubmitterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_submit_timeout_ms() -> u64 {
    DEFAULT_SUBMIT_TIMEOUT_MS
}

fn default_dedup_window_secs() -> u64 {
    DEFAULT_DEDUP_WINDOW_SECS
}
