use sha3::{Digest, Keccak256};

/// Keccak-256 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using Keccak-256.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Hash a message the way ledger wallets do before signing it
/// (`"\x19Ethereum Signed Message:\n" || len || message`).
pub fn eth_message_hash(message: &[u8]) -> Hash {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// `0x`-prefixed lowercase hex.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed (or bare) hex into a 32-byte hash.
pub fn hash_from_hex(s: &str) -> Result<Hash, crate::CryptoError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped)
        .map_err(|e| crate::CryptoError::InvalidInput(format!("invalid hash hex: {}", e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        crate::CryptoError::InvalidInput(format!("hash must be 32 bytes, got {}", bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak_deterministic() {
        assert_eq!(keccak256(b"credential"), keccak256(b"credential"));
        assert_ne!(keccak256(b"credential A"), keccak256(b"credential B"));
    }

    #[test]
    fn test_message_hash_differs_from_plain_hash() {
        let digest = keccak256(b"payload");
        assert_ne!(eth_message_hash(&digest), keccak256(&digest));
    }

    #[test]
    fn test_prefixed_hex_roundtrip() {
        let h = keccak256(b"abc");
        let s = to_prefixed_hex(&h);
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 66);
        assert_eq!(hash_from_hex(&s).unwrap(), h);
    }

    #[test]
    fn test_hash_from_hex_rejects_short() {
        assert!(hash_from_hex("0x1234").is_err());
    }
}
