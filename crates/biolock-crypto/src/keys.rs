use biolock_core::Address;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::hashing::keccak256;

/// secp256k1 key pair an issuer signs credential hashes with.
/// Private key material is zeroized on drop by `k256`.
pub struct IssuerKey {
    signing_key: SigningKey,
}

impl IssuerKey {
    /// Generate a new random key using OS-provided entropy.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create from a 32-byte private scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid private key: {}", e)))?;
        Ok(Self { signing_key })
    }

    /// Decode a `0x`-prefixed (or bare) hex private key.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut bytes = hex::decode(stripped)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid hex: {}", e)))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// The ledger address controlled by this key.
    pub fn address(&self) -> Address {
        address_of(self.signing_key.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

/// Derive the ledger address of a public key: the last 20 bytes of the
/// Keccak-256 hash of the uncompressed point without its `0x04` tag.
pub(crate) fn address_of(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::from_bytes(bytes)
}

/// Mixed-case checksum rendering of an address (EIP-55).
pub fn checksum_address(address: &Address) -> String {
    let lower = address.to_hex();
    let digest = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development accounts.
    const DEV_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDR_0: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const DEV_KEY_1: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const DEV_ADDR_1: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[test]
    fn test_address_from_known_key() {
        let key = IssuerKey::from_hex(DEV_KEY_0).unwrap();
        assert_eq!(key.address(), DEV_ADDR_0.parse().unwrap());
        let key = IssuerKey::from_hex(DEV_KEY_1).unwrap();
        assert_eq!(key.address(), DEV_ADDR_1.parse().unwrap());
    }

    #[test]
    fn test_checksum_address() {
        let addr: Address = DEV_ADDR_0.parse().unwrap();
        assert_eq!(checksum_address(&addr), DEV_ADDR_0);
        let addr: Address = DEV_ADDR_1.parse().unwrap();
        assert_eq!(checksum_address(&addr), DEV_ADDR_1);
    }

    #[test]
    fn test_generate_distinct_addresses() {
        assert_ne!(IssuerKey::generate().address(), IssuerKey::generate().address());
    }

    #[test]
    fn test_from_bytes_invalid_length() {
        assert!(matches!(
            IssuerKey::from_bytes(&[1u8; 31]),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn test_zero_scalar_rejected() {
        assert!(IssuerKey::from_bytes(&[0u8; 32]).is_err());
    }
}
