//! RSA-OAEP(SHA-256) wrapping of symmetric keys for transport to the oracle.
//!
//! The wrapped value is `base64(RSA-OAEP-SHA256(hex(key)))`: the hex string
//! of the key is encrypted, not the raw bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;

use crate::encryption::SymmetricKey;
use crate::error::CryptoError;

/// Default modulus size for newly generated oracle keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// A base64-encoded RSA-OAEP ciphertext of a hex symmetric key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey(String);

impl WrappedKey {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The oracle's RSA key pair.
#[derive(Clone)]
pub struct OracleKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl OracleKeyPair {
    /// Generate a fresh key pair with a modulus of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map_err(|e| CryptoError::KeyStore(format!("RSA key generation failed: {}", e)))?;
        Ok(Self::from_private_key(private_key))
    }

    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    /// Pair a private key with a separately stored public key, checking they
    /// belong together.
    pub fn from_parts(
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
    ) -> Result<Self, CryptoError> {
        if RsaPublicKey::from(&private_key) != public_key {
            return Err(CryptoError::KeyStore(
                "public key does not match private key".into(),
            ));
        }
        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

impl fmt::Debug for OracleKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleKeyPair")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Wrap a symmetric key under the oracle's public key.
pub fn wrap_symmetric_key(
    key: &SymmetricKey,
    public_key: &RsaPublicKey,
) -> Result<WrappedKey, CryptoError> {
    let hex_key = key.to_hex();
    let ciphertext = public_key
        .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), hex_key.as_bytes())
        .map_err(|e| CryptoError::KeyWrap(e.to_string()))?;
    Ok(WrappedKey(STANDARD.encode(ciphertext)))
}

/// Unwrap a base64 RSA-OAEP ciphertext back into the symmetric key.
pub fn unwrap_symmetric_key(
    wrapped: &str,
    private_key: &RsaPrivateKey,
) -> Result<SymmetricKey, CryptoError> {
    let ciphertext = STANDARD
        .decode(wrapped.trim())
        .map_err(|e| CryptoError::KeyUnwrap(format!("invalid base64: {}", e)))?;
    let hex_key = private_key
        .decrypt(Oaep::new::<Sha256>(), &ciphertext)
        .map_err(|e| CryptoError::KeyUnwrap(e.to_string()))?;
    let hex_key = String::from_utf8(hex_key)
        .map_err(|_| CryptoError::KeyUnwrap("unwrapped key is not UTF-8".into()))?;
    SymmetricKey::from_hex(&hex_key)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::OnceLock;

    /// RSA key generation is slow; share one pair per test binary.
    pub(crate) fn shared_pair() -> &'static OracleKeyPair {
        static PAIR: OnceLock<OracleKeyPair> = OnceLock::new();
        PAIR.get_or_init(|| OracleKeyPair::generate(DEFAULT_RSA_BITS).unwrap())
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let pair = shared_pair();
        let key = SymmetricKey::generate();
        let wrapped = wrap_symmetric_key(&key, pair.public_key()).unwrap();
        assert_ne!(wrapped.as_str(), key.to_hex());
        let unwrapped = unwrap_symmetric_key(wrapped.as_str(), pair.private_key()).unwrap();
        assert_eq!(unwrapped, key);
    }

    #[test]
    fn test_wrapping_is_randomized() {
        let pair = shared_pair();
        let key = SymmetricKey::generate();
        let a = wrap_symmetric_key(&key, pair.public_key()).unwrap();
        let b = wrap_symmetric_key(&key, pair.public_key()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unwrap_garbage_fails() {
        let pair = shared_pair();
        assert!(matches!(
            unwrap_symmetric_key("not base64!!", pair.private_key()),
            Err(CryptoError::KeyUnwrap(_))
        ));
        assert!(matches!(
            unwrap_symmetric_key(&STANDARD.encode([0u8; 256]), pair.private_key()),
            Err(CryptoError::KeyUnwrap(_))
        ));
    }

    #[test]
    fn test_from_parts_rejects_mismatch() {
        let pair = shared_pair();
        let other = OracleKeyPair::generate(1024).unwrap();
        assert!(OracleKeyPair::from_parts(
            pair.private_key().clone(),
            other.public_key().clone()
        )
        .is_err());
        assert!(OracleKeyPair::from_parts(
            pair.private_key().clone(),
            pair.public_key().clone()
        )
        .is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_unwrap_inverts_wrap(key_bytes in prop::array::uniform32(any::<u8>())) {
            let pair = shared_pair();
            let key = SymmetricKey::from_bytes(&key_bytes).unwrap();
            let wrapped = wrap_symmetric_key(&key, pair.public_key()).unwrap();
            let unwrapped = unwrap_symmetric_key(wrapped.as_str(), pair.private_key()).unwrap();
            prop_assert_eq!(unwrapped, key);
        }
    }
}
