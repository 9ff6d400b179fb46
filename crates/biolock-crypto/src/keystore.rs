//! Sources of the oracle's RSA key pair.
//!
//! The oracle receives a [`KeyStore`] at construction instead of reaching for
//! process-wide key state, so tests can supply ephemeral keys and a rotated
//! pair only requires building the oracle with another store.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::{Path, PathBuf};

use crate::encryption::SymmetricKey;
use crate::error::CryptoError;
use crate::keywrap::{unwrap_symmetric_key, wrap_symmetric_key, OracleKeyPair, WrappedKey};

/// Read-only access to the oracle's key pair.
pub trait KeyStore: Send + Sync {
    fn key_pair(&self) -> &OracleKeyPair;

    /// Wrap a symmetric key for transport to the oracle.
    fn wrap(&self, key: &SymmetricKey) -> Result<WrappedKey, CryptoError> {
        wrap_symmetric_key(key, self.key_pair().public_key())
    }

    /// Recover a symmetric key wrapped under this store's public key.
    fn unwrap(&self, wrapped: &str) -> Result<SymmetricKey, CryptoError> {
        unwrap_symmetric_key(wrapped, self.key_pair().private_key())
    }
}

/// Key pair loaded once from PEM files on disk.
#[derive(Debug)]
pub struct PemFileKeyStore {
    pair: OracleKeyPair,
    public_path: PathBuf,
    private_path: PathBuf,
}

impl PemFileKeyStore {
    /// Load and cross-check the public and private PEM files. PKCS#8/SPKI
    /// and PKCS#1 encodings are both accepted.
    pub fn load(public_path: &Path, private_path: &Path) -> Result<Self, CryptoError> {
        let private_pem = std::fs::read_to_string(private_path).map_err(|e| {
            CryptoError::KeyStore(format!(
                "cannot read private key {}: {}",
                private_path.display(),
                e
            ))
        })?;
        let public_pem = std::fs::read_to_string(public_path).map_err(|e| {
            CryptoError::KeyStore(format!(
                "cannot read public key {}: {}",
                public_path.display(),
                e
            ))
        })?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(&private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&private_pem))
            .map_err(|e| CryptoError::KeyStore(format!("invalid private key PEM: {}", e)))?;
        let public_key = RsaPublicKey::from_public_key_pem(&public_pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(&public_pem))
            .map_err(|e| CryptoError::KeyStore(format!("invalid public key PEM: {}", e)))?;

        let pair = OracleKeyPair::from_parts(private_key, public_key)?;
        tracing::info!(
            public = %public_path.display(),
            private = %private_path.display(),
            "loaded oracle key pair"
        );

        Ok(Self {
            pair,
            public_path: public_path.to_path_buf(),
            private_path: private_path.to_path_buf(),
        })
    }

    pub fn public_path(&self) -> &Path {
        &self.public_path
    }

    pub fn private_path(&self) -> &Path {
        &self.private_path
    }
}

impl KeyStore for PemFileKeyStore {
    fn key_pair(&self) -> &OracleKeyPair {
        &self.pair
    }
}

/// In-memory key pair that never touches disk.
#[derive(Debug, Clone)]
pub struct EphemeralKeyStore {
    pair: OracleKeyPair,
}

impl EphemeralKeyStore {
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        Ok(Self {
            pair: OracleKeyPair::generate(bits)?,
        })
    }

    pub fn from_pair(pair: OracleKeyPair) -> Self {
        Self { pair }
    }
}

impl KeyStore for EphemeralKeyStore {
    fn key_pair(&self) -> &OracleKeyPair {
        &self.pair
    }
}

/// Persist a key pair as SPKI (public) and PKCS#8 (private) PEM files.
pub fn write_key_pair_pem(
    pair: &OracleKeyPair,
    public_path: &Path,
    private_path: &Path,
) -> Result<(), CryptoError> {
    let private_pem = pair
        .private_key()
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyStore(format!("private key encoding failed: {}", e)))?;
    let public_pem = pair
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyStore(format!("public key encoding failed: {}", e)))?;

    for path in [public_path, private_path] {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    write_private_pem(private_path, private_pem.as_bytes())?;
    std::fs::write(public_path, public_pem.as_bytes())?;

    tracing::info!(
        public = %public_path.display(),
        private = %private_path.display(),
        "wrote oracle key pair"
    );
    Ok(())
}

/// Owner read/write only on unix, including when overwriting an existing file.
#[cfg(unix)]
fn write_private_pem(path: &Path, pem: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(pem)
}

#[cfg(not(unix))]
fn write_private_pem(path: &Path, pem: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, pem)
}
