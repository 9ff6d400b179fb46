//! Symmetric encryption of biometric templates and the split-secret layout
//! used to store them.
//!
//! Blobs use AES-256-CBC with PKCS#7 padding and a fresh random 16-byte IV,
//! serialized as `ivHex:cipherHex`. There is no authentication tag: a wrong
//! key is detected only through the padding check, which surfaces as
//! [`CryptoError::Decryption`].

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of a symmetric key in bytes.
pub const KEY_LEN: usize = 32;
/// Length of the CBC initialisation vector in bytes.
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// A 256-bit AES key. Zeroized on drop; never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Generate a fresh key from OS entropy.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes, which must be exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Decode from the 64-character hex form.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(hex_str.trim())
            .map_err(|e| CryptoError::InvalidInput(format!("invalid key hex: {}", e)))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Hex encoding, the form in which keys travel and get wrapped.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Generate a fresh symmetric key, hex-encoded.
pub fn generate_symmetric_key() -> String {
    SymmetricKey::generate().to_hex()
}

/// An AES-256-CBC ciphertext with its IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

impl FromStr for EncryptedBlob {
    type Err = CryptoError;

    /// Parse `ivHex:cipherHex`. Only the first `:` separates the two parts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (iv_hex, cipher_hex) = s
            .split_once(':')
            .ok_or_else(|| CryptoError::BlobFormat("missing ':' separator".into()))?;

        if iv_hex.len() != IV_LEN * 2 {
            return Err(CryptoError::BlobFormat(format!(
                "IV must be {} hex characters, got {}",
                IV_LEN * 2,
                iv_hex.len()
            )));
        }
        let iv_bytes = hex::decode(iv_hex)
            .map_err(|e| CryptoError::BlobFormat(format!("invalid IV hex: {}", e)))?;
        let ciphertext = hex::decode(cipher_hex)
            .map_err(|e| CryptoError::BlobFormat(format!("invalid ciphertext hex: {}", e)))?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::BlobFormat(format!(
                "ciphertext length {} is not a positive multiple of {}",
                ciphertext.len(),
                BLOCK_LEN
            )));
        }

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&iv_bytes);
        Ok(Self { iv, ciphertext })
    }
}

impl fmt::Display for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.iv), hex::encode(&self.ciphertext))
    }
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedBlob, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv).map_err(|e| {
        CryptoError::InvalidInput(format!("cipher init failed: {}", e))
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(EncryptedBlob { iv, ciphertext })
}

/// Decrypt a blob. A wrong key is reported as [`CryptoError::Decryption`].
pub fn decrypt(blob: &EncryptedBlob, key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), &blob.iv).map_err(|e| {
        CryptoError::InvalidInput(format!("cipher init failed: {}", e))
    })?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&blob.ciphertext)
        .map_err(|_| CryptoError::Decryption("bad padding (wrong key or corrupted data)".into()))
}

/// Parse an `ivHex:cipherHex` string and decrypt it to UTF-8 text.
pub fn decrypt_str(blob: &str, key: &SymmetricKey) -> Result<String, CryptoError> {
    let blob: EncryptedBlob = blob.parse()?;
    let plaintext = decrypt(&blob, key)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".into()))
}

/// Split `s` into `(first, rest)` where `first` holds `ceil(len / 2)`
/// characters and `first + rest == s`.
pub fn split_string(s: &str) -> (String, String) {
    let len = s.chars().count();
    let midpoint = len.div_ceil(2);
    let byte_idx = s
        .char_indices()
        .nth(midpoint)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    let (first, rest) = s.split_at(byte_idx);
    (first.to_string(), rest.to_string())
}

/// An encrypted blob divided into a holder-local half and a ledger-visible
/// half.
///
/// This is plain concatenation, not secret sharing: each half on its own
/// exposes the corresponding ciphertext bytes (the local half always carries
/// the IV). Confidentiality rests entirely on the symmetric key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSecret {
    /// First half, kept by the holder.
    pub local: String,
    /// Second half, registered on the ledger.
    pub remote: String,
}

impl SplitSecret {
    pub fn split(blob: &str) -> Self {
        let (local, remote) = split_string(blob);
        Self { local, remote }
    }

    pub fn from_parts(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// `local + remote`, byte-for-byte the original blob.
    pub fn recombine(&self) -> String {
        let mut out = String::with_capacity(self.local.len() + self.remote.len());
        out.push_str(&self.local);
        out.push_str(&self.remote);
        out
    }
}
