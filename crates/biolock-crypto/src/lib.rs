pub mod encryption;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod keystore;
pub mod keywrap;
pub mod signing;

pub use encryption::{
    decrypt, decrypt_str, encrypt, generate_symmetric_key, split_string, EncryptedBlob,
    SplitSecret, SymmetricKey,
};
pub use error::CryptoError;
pub use hashing::{eth_message_hash, hash_from_hex, keccak256, to_prefixed_hex, Hash};
pub use keys::{checksum_address, IssuerKey};
pub use keystore::{write_key_pair_pem, EphemeralKeyStore, KeyStore, PemFileKeyStore};
pub use keywrap::{unwrap_symmetric_key, wrap_symmetric_key, OracleKeyPair, WrappedKey};
pub use signing::{recover_address, sign_hash, RecoverableSignature, SignedMessage};
