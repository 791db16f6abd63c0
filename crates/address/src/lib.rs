//! Derivation of federation deposit addresses.
//!
//! A deposit address is a P2TR output with two spending paths:
//!
//! 1. **Federation path (internal key)**: the MuSig2 aggregate of every guardian key. The
//!    federation spends the deposit cooperatively through the key path.
//!
//! 2. **Takeback path (tapscript)**: `<claim_pk> OP_CHECKSIGVERIFY <recovery_delay> OP_CSV`, which
//!    lets the depositor reclaim funds the federation never processed. It also binds the address to
//!    the claim key: a different claim key yields a different output key.
//!
//! Derivation is a pure function of the federation keys, the claim key, the recovery delay and the
//! network.

mod errors;
mod lock;

pub use errors::AddressError;
pub use lock::{aggregate_federation_key, deposit_locking_script, takeback_script};

use bitcoin::{Address, XOnlyPublicKey};
use fedpeg_config::ClientConfig;
use fedpeg_primitives::DepositAddress;
use secp256k1::SECP256K1;

/// Derives the deposit address for `claim_pubkey` under the federation described by `config`.
///
/// # Errors
///
/// Returns [`AddressError`] if the federation key set is empty, contains duplicates or cannot be
/// aggregated.
pub fn derive_deposit_address(
    config: &ClientConfig,
    claim_pubkey: &XOnlyPublicKey,
) -> Result<DepositAddress, AddressError> {
    let internal_key = aggregate_federation_key(config.federation.pubkeys())?;
    let spend_info = lock::deposit_spend_info(
        claim_pubkey,
        internal_key,
        config.pegin.recovery_delay,
    )?;

    let address = Address::p2tr(
        SECP256K1,
        internal_key,
        spend_info.merkle_root(),
        config.network,
    );

    Ok(DepositAddress::new(address))
}

#[cfg(test)]
mod tests {
    use bitcoin::{AddressType, Network};
    use fedpeg_primitives::ClaimKey;
    use fedpeg_test_utils_btc::{TestFederation, claim_key};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let federation = TestFederation::new(4);
        let config = federation.client_config();
        let key = claim_key(1);

        let a = derive_deposit_address(&config, &key.public_key()).unwrap();
        let b = derive_deposit_address(&config, &key.public_key()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_address_is_taproot_on_configured_network() {
        let config = TestFederation::new(4).client_config();
        let addr = derive_deposit_address(&config, &claim_key(1).public_key()).unwrap();

        assert_eq!(addr.address().address_type(), Some(AddressType::P2tr));
        assert!(addr.to_string().starts_with("bcrt1p"));
        assert!(addr.script_pubkey().is_p2tr());
    }

    #[test]
    fn test_address_matches_locking_script() {
        let config = TestFederation::new(3).client_config();
        let claim = claim_key(2).public_key();

        let addr = derive_deposit_address(&config, &claim).unwrap();
        let internal = aggregate_federation_key(config.federation.pubkeys()).unwrap();
        let script =
            deposit_locking_script(&claim, internal, config.pegin.recovery_delay).unwrap();

        assert_eq!(addr.script_pubkey(), script.as_script());
    }

    #[test]
    fn test_claim_key_changes_address() {
        let config = TestFederation::new(4).client_config();

        let a = derive_deposit_address(&config, &claim_key(1).public_key()).unwrap();
        let b = derive_deposit_address(&config, &claim_key(2).public_key()).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_federation_keys_change_address() {
        let claim = claim_key(1).public_key();
        let a = derive_deposit_address(&TestFederation::new(4).client_config(), &claim).unwrap();
        let b = derive_deposit_address(&TestFederation::new(5).client_config(), &claim).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_recovery_delay_changes_address() {
        let mut config = TestFederation::new(4).client_config();
        let claim = claim_key(1).public_key();
        let a = derive_deposit_address(&config, &claim).unwrap();

        config.pegin.recovery_delay += 1;
        let b = derive_deposit_address(&config, &claim).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_network_changes_encoding_not_script() {
        let mut config = TestFederation::new(4).client_config();
        let claim = claim_key(1).public_key();
        let regtest = derive_deposit_address(&config, &claim).unwrap();

        config.network = Network::Bitcoin;
        let mainnet = derive_deposit_address(&config, &claim).unwrap();

        assert!(mainnet.to_string().starts_with("bc1p"));
        assert_eq!(regtest.script_pubkey(), mainnet.script_pubkey());
    }

    #[test]
    fn test_empty_federation_is_rejected() {
        let mut config = TestFederation::new(4).client_config();
        config.federation.guardians.clear();

        let err = derive_deposit_address(&config, &claim_key(1).public_key()).unwrap_err();
        assert!(matches!(err, AddressError::EmptyFederation));
    }

    #[test]
    fn test_duplicate_federation_key_is_rejected() {
        let mut config = TestFederation::new(4).client_config();
        config.federation.guardians[3].pubkey = config.federation.guardians[0].pubkey;

        let err = derive_deposit_address(&config, &claim_key(1).public_key()).unwrap_err();
        assert!(matches!(err, AddressError::DuplicateKey { index: 3 }));
    }

    proptest! {
        #[test]
        fn proptest_derivation_is_deterministic(seed in 1u8..=254, guardians in 1usize..=7) {
            let config = TestFederation::new(guardians).client_config();
            let key = ClaimKey::from_slice(&[seed; 32]).unwrap();

            let a = derive_deposit_address(&config, &key.public_key()).unwrap();
            let b = derive_deposit_address(&config, &key.public_key()).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
