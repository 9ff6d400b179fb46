use biolock_core::{Address, Credential};
use biolock_crypto::{hash_from_hex, recover_address, RecoverableSignature, SignedMessage};

use crate::issuer::credential_hash;

/// Result of checking a signature against an expected signer. A mismatch is
/// an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The signature recovers to the expected address.
    Verified,
    /// The signature is well formed but recovers to another address.
    Mismatch { recovered: Address },
    /// The hash or signature could not be decoded.
    Malformed(String),
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified)
    }
}

/// Decode a signature given either as the wallet JSON layout or as bare
/// 65-byte hex.
fn parse_signature(signature: &str) -> Result<RecoverableSignature, String> {
    let trimmed = signature.trim();
    if trimmed.starts_with('{') {
        SignedMessage::from_json(trimmed)
            .and_then(|m| m.recoverable())
            .map_err(|e| e.to_string())
    } else {
        RecoverableSignature::from_hex(trimmed).map_err(|e| e.to_string())
    }
}

/// Recover the signer of `hash` and compare it with `expected`.
pub fn check_signature(hash: &str, signature: &str, expected: &Address) -> VerificationOutcome {
    let hash = match hash_from_hex(hash) {
        Ok(h) => h,
        Err(e) => return VerificationOutcome::Malformed(e.to_string()),
    };
    let signature = match parse_signature(signature) {
        Ok(s) => s,
        Err(e) => return VerificationOutcome::Malformed(e),
    };
    let recovered = match recover_address(&hash, &signature) {
        Ok(a) => a,
        Err(e) => return VerificationOutcome::Malformed(e.to_string()),
    };

    // Addresses compare on bytes, so letter case never matters.
    if &recovered == expected {
        VerificationOutcome::Verified
    } else {
        tracing::debug!(recovered = %recovered, expected = %expected, "signer mismatch");
        VerificationOutcome::Mismatch { recovered }
    }
}

/// `true` iff `signature` over `hash` was produced by `expected`.
pub fn verify_signature(hash: &str, signature: &str, expected: &Address) -> bool {
    check_signature(hash, signature, expected).is_verified()
}

/// Recompute the credential's hash and check its issuer signed it.
pub fn verify_credential(credential: &Credential, signature: &str) -> VerificationOutcome {
    match credential_hash(credential) {
        Ok(hash) => check_signature(
            &biolock_crypto::to_prefixed_hex(&hash),
            signature,
            &credential.issuer,
        ),
        Err(e) => VerificationOutcome::Malformed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::CredentialIssuer;
    use biolock_crypto::IssuerKey;
    use serde_json::json;

    fn issue() -> (CredentialIssuer, crate::IssuedCredential) {
        let issuer = CredentialIssuer::new(IssuerKey::generate());
        let issued = issuer
            .issue(json!("claim"), Address::from_bytes([1; 20]), 0)
            .unwrap();
        (issuer, issued)
    }

    #[test]
    fn test_verify_with_json_signature() {
        let (issuer, issued) = issue();
        let json = issued.signature_json().unwrap();
        assert!(verify_signature(&issued.hash, &json, &issuer.address()));
    }

    #[test]
    fn test_verify_with_raw_signature() {
        let (issuer, issued) = issue();
        assert!(verify_signature(
            &issued.hash,
            &issued.signature.signature,
            &issuer.address()
        ));
    }

    #[test]
    fn test_other_address_is_mismatch() {
        let (_, issued) = issue();
        let other = IssuerKey::generate().address();
        let outcome = check_signature(&issued.hash, &issued.signature.signature, &other);
        assert!(matches!(outcome, VerificationOutcome::Mismatch { .. }));
        assert!(!outcome.is_verified());
    }

    #[test]
    fn test_case_insensitive_expected_address() {
        let (issuer, issued) = issue();
        let upper: Address = issuer.address().to_hex().to_uppercase().parse().unwrap();
        assert!(verify_signature(&issued.hash, &issued.signature.signature, &upper));
    }

    #[test]
    fn test_malformed_inputs_do_not_error() {
        let (issuer, issued) = issue();
        assert!(matches!(
            check_signature("0xzz", &issued.signature.signature, &issuer.address()),
            VerificationOutcome::Malformed(_)
        ));
        assert!(matches!(
            check_signature(&issued.hash, "{not json", &issuer.address()),
            VerificationOutcome::Malformed(_)
        ));
        assert!(!verify_signature(&issued.hash, "0x1234", &issuer.address()));
    }

    #[test]
    fn test_verify_credential_detects_tampering() {
        let (_, issued) = issue();
        let sig = issued.signature_json().unwrap();
        assert!(verify_credential(&issued.credential, &sig).is_verified());

        let mut tampered = issued.credential.clone();
        tampered.epoch += 1;
        assert!(!verify_credential(&tampered, &sig).is_verified());
    }
}
