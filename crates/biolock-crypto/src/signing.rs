use biolock_core::Address;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::hashing::{eth_message_hash, to_prefixed_hex, Hash};
use crate::keys::{address_of, IssuerKey};

/// Offset added to the recovery id in the serialized `v` byte.
const V_OFFSET: u8 = 27;

/// A 65-byte recoverable secp256k1 signature (`r || s || v`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    rs: [u8; 64],
    recovery_id: u8,
}

impl RecoverableSignature {
    /// Recovery id in `0..=1`.
    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    pub fn r(&self) -> &[u8] {
        &self.rs[..32]
    }

    pub fn s(&self) -> &[u8] {
        &self.rs[32..]
    }

    /// The serialized `v` byte (27 or 28).
    pub fn v(&self) -> u8 {
        self.recovery_id + V_OFFSET
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&self.rs);
        out[64] = self.v();
        out
    }

    /// Parse 65 bytes; `v` may be given as 0/1 or 27/28.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let recovery_id = match bytes[64] {
            v @ 0..=1 => v,
            v @ 27..=28 => v - V_OFFSET,
            v => {
                return Err(CryptoError::InvalidSignature(format!(
                    "invalid recovery byte {}",
                    v
                )))
            }
        };
        let mut rs = [0u8; 64];
        rs.copy_from_slice(&bytes[..64]);
        Ok(Self { rs, recovery_id })
    }

    /// `0x`-prefixed 130-character hex.
    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| CryptoError::InvalidSignature(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// A signed credential hash, in the JSON layout wallets return from
/// `sign(message, privateKey)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    /// The signed 32-byte hash, hex.
    pub message: String,
    /// The prefixed message digest actually signed, hex.
    pub message_hash: String,
    pub v: String,
    pub r: String,
    pub s: String,
    /// `r || s || v`, hex.
    pub signature: String,
}

impl SignedMessage {
    fn new(message: &Hash, digest: &Hash, sig: &RecoverableSignature) -> Self {
        Self {
            message: to_prefixed_hex(message),
            message_hash: to_prefixed_hex(digest),
            v: format!("0x{:x}", sig.v()),
            r: to_prefixed_hex(sig.r()),
            s: to_prefixed_hex(sig.s()),
            signature: sig.to_hex(),
        }
    }

    /// Extract the recoverable signature.
    pub fn recoverable(&self) -> Result<RecoverableSignature, CryptoError> {
        RecoverableSignature::from_hex(&self.signature)
    }

    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self)
            .map_err(|e| CryptoError::InvalidInput(format!("signature serialization: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::InvalidSignature(format!("malformed signature JSON: {}", e)))
    }
}

/// Sign a 32-byte hash as a prefixed wallet message.
pub fn sign_hash(hash: &Hash, key: &IssuerKey) -> Result<SignedMessage, CryptoError> {
    let digest = eth_message_hash(hash);
    let (signature, recovery_id) = key
        .signing_key()
        .sign_prehash_recoverable(&digest)
        .map_err(|e| CryptoError::SigningError(e.to_string()))?;

    let mut rs = [0u8; 64];
    rs.copy_from_slice(&signature.to_bytes());
    let sig = RecoverableSignature {
        rs,
        recovery_id: recovery_id.to_byte(),
    };
    Ok(SignedMessage::new(hash, &digest, &sig))
}

/// Recover the address that produced `signature` over `hash`.
pub fn recover_address(hash: &Hash, signature: &RecoverableSignature) -> Result<Address, CryptoError> {
    let digest = eth_message_hash(hash);
    let sig = Signature::from_slice(&signature.rs)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature.recovery_id)
        .ok_or_else(|| CryptoError::InvalidSignature("invalid recovery id".into()))?;
    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| CryptoError::InvalidSignature(format!("recovery failed: {}", e)))?;
    Ok(address_of(&verifying_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::keccak256;

    #[test]
    fn test_sign_recover_roundtrip() {
        let key = IssuerKey::generate();
        let hash = keccak256(b"credential");
        let signed = sign_hash(&hash, &key).unwrap();
        let recovered = recover_address(&hash, &signed.recoverable().unwrap()).unwrap();
        assert_eq!(recovered, key.address());
    }

    #[test]
    fn test_recover_wrong_hash_gives_other_address() {
        let key = IssuerKey::generate();
        let signed = sign_hash(&keccak256(b"original"), &key).unwrap();
        let sig = signed.recoverable().unwrap();
        match recover_address(&keccak256(b"tampered"), &sig) {
            Ok(addr) => assert_ne!(addr, key.address()),
            Err(_) => {}
        }
    }

    #[test]
    fn test_signed_message_layout() {
        let key = IssuerKey::generate();
        let hash = keccak256(b"layout");
        let signed = sign_hash(&hash, &key).unwrap();
        assert_eq!(signed.message, to_prefixed_hex(&hash));
        assert_eq!(signed.signature.len(), 132);
        assert!(signed.v == "0x1b" || signed.v == "0x1c");
        assert_eq!(signed.r.len(), 66);
        assert_eq!(signed.s.len(), 66);
    }

    #[test]
    fn test_signed_message_json_roundtrip() {
        let key = IssuerKey::generate();
        let signed = sign_hash(&keccak256(b"json"), &key).unwrap();
        let json = signed.to_json().unwrap();
        assert!(json.contains("messageHash"));
        let back = SignedMessage::from_json(&json).unwrap();
        assert_eq!(back, signed);
    }

    #[test]
    fn test_signature_accepts_raw_recovery_byte() {
        let key = IssuerKey::generate();
        let hash = keccak256(b"v-byte");
        let sig = sign_hash(&hash, &key).unwrap().recoverable().unwrap();
        let mut raw = sig.to_bytes();
        raw[64] -= 27;
        let parsed = RecoverableSignature::from_bytes(&raw).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn test_signature_invalid_inputs() {
        assert!(RecoverableSignature::from_bytes(&[0u8; 64]).is_err());
        let mut bytes = [1u8; 65];
        bytes[64] = 5;
        assert!(RecoverableSignature::from_bytes(&bytes).is_err());
        assert!(RecoverableSignature::from_hex("0xnothex").is_err());
        assert!(SignedMessage::from_json("{}").is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let key = IssuerKey::from_bytes(&[7u8; 32]).unwrap();
        let hash = keccak256(b"rfc6979");
        assert_eq!(
            sign_hash(&hash, &key).unwrap(),
            sign_hash(&hash, &key).unwrap()
        );
    }
}
