use bitcoin::Network;
use fedpeg_config::{ClientConfig, FederationConfig, GuardianConfig};
use fedpeg_primitives::{ClaimKey, GuardianId};
use secp256k1::{SECP256K1, SecretKey};

/// A federation with deterministic guardian keys.
#[derive(Debug, Clone)]
pub struct TestFederation {
    secret_keys: Vec<SecretKey>,
    config: FederationConfig,
}

impl TestFederation {
    /// Creates a federation of `n` guardians. The same `n` always yields the same keys.
    pub fn new(n: usize) -> Self {
        let secret_keys: Vec<_> = (0..n).map(guardian_secret_key).collect();
        let guardians = secret_keys
            .iter()
            .enumerate()
            .map(|(i, sk)| GuardianConfig {
                id: GuardianId::new(i as u16),
                endpoint: format!("http://127.0.0.1:{}", 18_400 + i),
                pubkey: sk.x_only_public_key(SECP256K1).0,
            })
            .collect();

        Self {
            secret_keys,
            config: FederationConfig::new(guardians),
        }
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn secret_keys(&self) -> &[SecretKey] {
        &self.secret_keys
    }

    /// Returns a regtest client config for this federation with retries and timeouts short
    /// enough for tests.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(Network::Regtest, self.config.clone());
        config.submitter.retry.base_delay_ms = 10;
        config.submitter.retry.max_delay_ms = 50;
        config.submitter.request_timeout_ms = 500;
        config.submitter.submit_timeout_ms = 5_000;
        config
    }
}

fn guardian_secret_key(index: usize) -> SecretKey {
    let mut bytes = [0x47; 32];
    bytes[30..].copy_from_slice(&(index as u16).to_be_bytes());
    SecretKey::from_slice(&bytes).expect("valid guardian key")
}

/// Returns the claim key with every secret byte set to `seed`.
///
/// # Panics
///
/// Panics if `seed` is 0 or 0xff; the latter exceeds the curve order.
pub fn claim_key(seed: u8) -> ClaimKey {
    ClaimKey::from_slice(&[seed; 32]).expect("seed in 1..=254")
}
