use std::fmt;

use secp256k1::{Keypair, SECP256K1, SecretKey, XOnlyPublicKey};

use crate::ParseError;

/// Key material binding a deposit to the depositor's future claim.
///
/// Owned by the caller. The client only borrows it for the duration of a single operation and
/// retains nothing but the x-only public key.
#[derive(Clone)]
pub struct ClaimKey(SecretKey);

impl ClaimKey {
    pub fn new(secret: SecretKey) -> Self {
        Self(secret)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        Ok(Self(SecretKey::from_slice(bytes)?))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.0
    }

    pub fn keypair(&self) -> Keypair {
        Keypair::from_secret_key(SECP256K1, &self.0)
    }

    /// Returns the x-only public key committed to in the deposit address.
    pub fn public_key(&self) -> XOnlyPublicKey {
        self.0.x_only_public_key(SECP256K1).0
    }
}

impl From<SecretKey> for ClaimKey {
    fn from(value: SecretKey) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClaimKey").field(&self.public_key()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_is_stable() {
        let key = ClaimKey::from_slice(&[0x11; 32]).unwrap();
        assert_eq!(key.public_key(), key.clone().public_key());
        assert_eq!(key.public_key(), key.keypair().x_only_public_key().0);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let key = ClaimKey::from_slice(&[0x11; 32]).unwrap();
        let dbg = format!("{key:?}");
        assert!(!dbg.contains(&"11".repeat(32)));
    }

    #[test]
    fn test_zero_key_is_rejected() {
        assert!(ClaimKey::from_slice(&[0; 32]).is_err());
    }

    #[test]
    fn test_repeated_byte_keys_up_to_curve_order() {
        assert!(ClaimKey::from_slice(&[0xfe; 32]).is_ok());
        assert!(matches!(
            ClaimKey::from_slice(&[0xff; 32]),
            Err(ParseError::InvalidKey(_))
        ));
    }
}
