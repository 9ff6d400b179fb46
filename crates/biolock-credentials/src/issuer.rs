use biolock_core::{Address, Credential};
use biolock_crypto::{keccak256, sign_hash, to_prefixed_hex, Hash, IssuerKey, SignedMessage};
use chrono::{SecondsFormat, Utc};

use crate::error::CredentialError;

/// Random bytes mixed into every credential id.
const ID_NONCE_LEN: usize = 16;

/// A freshly issued credential with its hash and the issuer's signature.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub credential: Credential,
    /// `0x`-prefixed Keccak-256 of the canonical serialization.
    pub hash: String,
    pub signature: SignedMessage,
}

impl IssuedCredential {
    /// The signature as the JSON string stored on the ledger.
    pub fn signature_json(&self) -> Result<String, CredentialError> {
        Ok(self.signature.to_json()?)
    }
}

/// Keccak-256 over the credential's canonical serialization. Issuer and
/// verifier must both use this.
pub fn credential_hash(credential: &Credential) -> Result<Hash, CredentialError> {
    Ok(keccak256(&credential.canonical_bytes()?))
}

/// `keccak256(issuer ‖ created ‖ claim ‖ nonce)`. The nonce keeps ids
/// distinct for identical claims issued within the same instant.
fn credential_id(issuer: &Address, created: &str, claim: &serde_json::Value) -> String {
    let nonce: [u8; ID_NONCE_LEN] = rand::random();
    let mut preimage = Vec::new();
    preimage.extend_from_slice(issuer.to_string().as_bytes());
    preimage.extend_from_slice(created.as_bytes());
    preimage.extend_from_slice(claim.to_string().as_bytes());
    preimage.extend_from_slice(&nonce);
    to_prefixed_hex(&keccak256(&preimage))
}

/// Build, hash and sign a credential.
///
/// `issuer` must be the address controlled by `issuer_key`.
pub fn generate_credential(
    claim: serde_json::Value,
    holder: Address,
    issuer: Address,
    issuer_key: &IssuerKey,
    epoch: u64,
) -> Result<IssuedCredential, CredentialError> {
    if issuer_key.address() != issuer {
        return Err(CredentialError::IssuanceFailed(format!(
            "signing key controls {}, not {}",
            issuer_key.address(),
            issuer
        )));
    }

    let created = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    let credential = Credential {
        id: credential_id(&issuer, &created, &claim),
        holder,
        issuer,
        created,
        epoch,
        claim,
    };

    let hash = credential_hash(&credential)?;
    let signature = sign_hash(&hash, issuer_key)?;

    tracing::info!(
        issuer = %issuer,
        holder = %holder,
        credential_id = %credential.id,
        epoch,
        "credential issued"
    );

    Ok(IssuedCredential {
        credential,
        hash: to_prefixed_hex(&hash),
        signature,
    })
}

/// Issues credentials signed by one issuer key.
pub struct CredentialIssuer {
    key: IssuerKey,
}

impl CredentialIssuer {
    pub fn new(key: IssuerKey) -> Self {
        Self { key }
    }

    /// Address credentials issued here are attributed to.
    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn issue(
        &self,
        claim: serde_json::Value,
        holder: Address,
        epoch: u64,
    ) -> Result<IssuedCredential, CredentialError> {
        generate_credential(claim, holder, self.address(), &self.key, epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biolock_crypto::{hash_from_hex, recover_address};
    use serde_json::json;

    const ISSUER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn holder() -> Address {
        "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
    }

    #[test]
    fn test_generate_credential_fields() {
        let key = IssuerKey::from_hex(ISSUER_KEY).unwrap();
        let issued =
            generate_credential(json!("Some credential information"), holder(), key.address(), &key, 3)
                .unwrap();

        let cred = &issued.credential;
        assert_eq!(cred.holder, holder());
        assert_eq!(cred.issuer, key.address());
        assert_eq!(cred.epoch, 3);
        assert_eq!(cred.claim, json!("Some credential information"));
        assert!(cred.id.starts_with("0x"));
        assert_eq!(cred.id.len(), 66);
        assert_eq!(issued.hash.len(), 66);
    }

    #[test]
    fn test_hash_matches_canonical_serialization() {
        let issuer = CredentialIssuer::new(IssuerKey::generate());
        let issued = issuer.issue(json!({"age": 30}), holder(), 0).unwrap();
        let recomputed = credential_hash(&issued.credential).unwrap();
        assert_eq!(to_prefixed_hex(&recomputed), issued.hash);
    }

    #[test]
    fn test_signature_recovers_issuer() {
        let issuer = CredentialIssuer::new(IssuerKey::generate());
        let issued = issuer.issue(json!("claim"), holder(), 0).unwrap();
        let hash = hash_from_hex(&issued.hash).unwrap();
        let recovered = recover_address(&hash, &issued.signature.recoverable().unwrap()).unwrap();
        assert_eq!(recovered, issuer.address());
        assert_eq!(issued.signature.message, issued.hash);
    }

    #[test]
    fn test_identical_claims_get_distinct_ids() {
        let issuer = CredentialIssuer::new(IssuerKey::generate());
        let ids: std::collections::HashSet<_> = (0..64)
            .map(|_| issuer.issue(json!("same"), holder(), 0).unwrap().credential.id)
            .collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_issuer_key_mismatch_rejected() {
        let key = IssuerKey::generate();
        let err = generate_credential(json!("x"), holder(), holder(), &key, 0).unwrap_err();
        assert!(matches!(err, CredentialError::IssuanceFailed(_)));
    }

    #[test]
    fn test_signature_json_is_wallet_layout() {
        let issuer = CredentialIssuer::new(IssuerKey::generate());
        let issued = issuer.issue(json!("x"), holder(), 0).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&issued.signature_json().unwrap()).unwrap();
        for field in ["message", "messageHash", "v", "r", "s", "signature"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
