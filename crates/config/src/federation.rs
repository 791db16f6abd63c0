use std::collections::HashSet;

use bitcoin::XOnlyPublicKey;
use fedpeg_primitives::GuardianId;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A single federation member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Identifier of the guardian within the federation.
    pub id: GuardianId,

    /// URL of the guardian's peg-in RPC endpoint.
    pub endpoint: String,

    /// The guardian's x-only MuSig2 public key.
    pub pubkey: XOnlyPublicKey,
}

/// The federation the client deposits into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Guardian nodes, in the order their keys are aggregated.
    pub guardians: Vec<GuardianConfig>,

    /// Number of guardians that must agree on a submission outcome.
    ///
    /// Defaults to the largest Byzantine-fault-tolerant quorum, `n - (n - 1) / 3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<usize>,
}

impl FederationConfig {
    pub fn new(guardians: Vec<GuardianConfig>) -> Self {
        Self {
            guardians,
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Returns the effective threshold.
    pub fn threshold(&self) -> usize {
        let n = self.guardians.len();
        self.threshold
            .unwrap_or_else(|| n - n.saturating_sub(1) / 3)
    }

    /// Iterates over the guardian public keys in aggregation order.
    pub fn pubkeys(&self) -> impl Iterator<Item = &XOnlyPublicKey> {
        self.guardians.iter().map(|g| &g.pubkey)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.guardians.is_empty() {
            return Err(ConfigError::NoGuardians);
        }

        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for guardian in &self.guardians {
            if !ids.insert(guardian.id) {
                return Err(ConfigError::DuplicateGuardianId(guardian.id));
            }
            if !keys.insert(guardian.pubkey) {
                return Err(ConfigError::DuplicateGuardianKey(guardian.id));
            }
            if guardian.endpoint.trim().is_empty() {
                return Err(ConfigError::EmptyEndpoint(guardian.id));
            }
        }

        let threshold = self.threshold();
        if threshold == 0 || threshold > self.guardians.len() {
            return Err(ConfigError::InvalidThreshold {
                threshold,
                guardians: self.guardians.len(),
            });
        }

        Ok(())
    }
}
