//! Biolock Credentials: Issuer, signature verifier, holder-side enrollment
//! and request building, and the client-side issuance listener.

pub mod error;
pub mod holder;
pub mod issuer;
pub mod listener;
pub mod verifier;

pub use error::CredentialError;
pub use holder::{AuthenticationRequestArgs, AuthenticationRequestBuilder, BiometricEnrollment};
pub use issuer::{credential_hash, generate_credential, CredentialIssuer, IssuedCredential};
pub use listener::{IssuanceListener, IssuanceOutcome};
pub use verifier::{verify_credential, verify_signature, VerificationOutcome};
