use std::collections::HashSet;

use bitcoin::{
    ScriptBuf, XOnlyPublicKey,
    key::Parity,
    opcodes::all::{OP_CHECKSIGVERIFY, OP_CSV},
    script::Builder,
    secp256k1::PublicKey,
    taproot::{TaprootBuilder, TaprootSpendInfo},
};
use musig2::KeyAggContext;
use secp256k1::SECP256K1;

use crate::AddressError;

/// Returns the MuSig2 aggregate of the federation keys, in iteration order.
///
/// # Errors
///
/// Returns an error if there are no keys, a key repeats, or aggregation fails.
pub fn aggregate_federation_key<'k>(
    keys: impl Iterator<Item = &'k XOnlyPublicKey>,
) -> Result<XOnlyPublicKey, AddressError> {
    let mut seen = HashSet::new();
    let public_keys = keys
        .enumerate()
        .map(|(index, x_only)| {
            if !seen.insert(*x_only) {
                return Err(AddressError::DuplicateKey { index });
            }
            Ok(PublicKey::from_x_only_public_key(*x_only, Parity::Even))
        })
        .collect::<Result<Vec<_>, AddressError>>()?;

    if public_keys.is_empty() {
        return Err(AddressError::EmptyFederation);
    }

    let agg_pubkey = KeyAggContext::new(public_keys)
        .map_err(|e| AddressError::KeyAggregation {
            reason: e.to_string(),
        })?
        .aggregated_pubkey::<PublicKey>()
        .x_only_public_key()
        .0;

    Ok(agg_pubkey)
}

/// Builds the depositor's takeback tapscript.
pub fn takeback_script(claim_pubkey: &XOnlyPublicKey, recovery_delay: u16) -> ScriptBuf {
    Builder::new()
        .push_slice(claim_pubkey.serialize())
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_int(recovery_delay as i64)
        .push_opcode(OP_CSV)
        .into_script()
}

pub(crate) fn deposit_spend_info(
    claim_pubkey: &XOnlyPublicKey,
    internal_key: XOnlyPublicKey,
    recovery_delay: u16,
) -> Result<TaprootSpendInfo, AddressError> {
    TaprootBuilder::new()
        .add_leaf(0, takeback_script(claim_pubkey, recovery_delay))
        .map_err(|e| AddressError::Taproot {
            reason: e.to_string(),
        })?
        .finalize(SECP256K1, internal_key)
        .map_err(|_| AddressError::Taproot {
            reason: "tap tree is incomplete".to_string(),
        })
}

/// Creates the P2TR locking script of a deposit output.
///
/// The internal key is the federation's aggregate key and the single tap leaf is the depositor's
/// takeback script.
pub fn deposit_locking_script(
    claim_pubkey: &XOnlyPublicKey,
    internal_key: XOnlyPublicKey,
    recovery_delay: u16,
) -> Result<ScriptBuf, AddressError> {
    let spend_info = deposit_spend_info(claim_pubkey, internal_key, recovery_delay)?;
    Ok(ScriptBuf::new_p2tr(
        SECP256K1,
        internal_key,
        spend_info.merkle_root(),
    ))
}

#[cfg(test)]
mod tests {
    use fedpeg_test_utils_btc::{TestFederation, claim_key};

    use super::*;

    #[test]
    fn test_aggregation_depends_on_order() {
        let federation = TestFederation::new(3);
        let keys: Vec<_> = federation.config().pubkeys().copied().collect();
        let reversed: Vec<_> = keys.iter().rev().copied().collect();

        let a = aggregate_federation_key(keys.iter()).unwrap();
        let b = aggregate_federation_key(reversed.iter()).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_single_key_aggregation_succeeds() {
        let federation = TestFederation::new(1);
        assert!(aggregate_federation_key(federation.config().pubkeys()).is_ok());
    }

    #[test]
    fn test_takeback_script_layout() {
        let claim = claim_key(5).public_key();
        let script = takeback_script(&claim, 1008);
        let bytes = script.as_bytes();

        // OP_PUSHBYTES_32 <claim> OP_CHECKSIGVERIFY <1008 as 2-byte push> OP_CSV
        assert_eq!(bytes[0], 32);
        assert_eq!(&bytes[1..33], &claim.serialize());
        assert_eq!(bytes[33], OP_CHECKSIGVERIFY.to_u8());
        assert_eq!(*bytes.last().unwrap(), OP_CSV.to_u8());
    }
}
