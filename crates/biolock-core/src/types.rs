use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A 20-byte ledger account address.
///
/// Parsed from `0x`-prefixed hex in any letter case and always displayed in
/// lowercase, so equality is case-insensitive by construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| {
            CoreError::InvalidAddress(format!("expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if stripped.len() != 40 {
            return Err(CoreError::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                stripped.len()
            )));
        }
        let bytes = hex::decode(stripped)
            .map_err(|e| CoreError::InvalidAddress(format!("invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Idempotency key for an authentication request: one result per
/// `(user, credId)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub user: Address,
    pub cred_id: String,
}

impl RequestKey {
    pub fn new(user: Address, cred_id: impl Into<String>) -> Self {
        Self {
            user,
            cred_id: cred_id.into(),
        }
    }

    /// Stable byte encoding used as a storage key.
    pub fn storage_key(&self) -> Vec<u8> {
        format!("{}/{}", self.user, self.cred_id).into_bytes()
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.cred_id)
    }
}

/// Position of an event in the ledger's log, ordered by block then log index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct EventPosition {
    pub block: u64,
    pub log_index: u32,
}

impl EventPosition {
    pub fn new(block: u64, log_index: u32) -> Self {
        Self { block, log_index }
    }
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.log_index)
    }
}

/// A single fingerprint ridge feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutiaPoint {
    pub x: f64,
    pub y: f64,
    /// Feature kind, e.g. `"ending"` or `"bifurcation"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ridge orientation in degrees.
    pub orientation: f64,
}

impl MinutiaPoint {
    pub fn new(x: f64, y: f64, kind: impl Into<String>, orientation: f64) -> Self {
        Self {
            x,
            y,
            kind: kind.into(),
            orientation,
        }
    }

    /// Euclidean distance in the image plane.
    pub fn distance(&self, other: &MinutiaPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An ordered collection of minutiae, serialized as
/// `{"minutiae_points": [...]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FingerprintTemplate {
    pub minutiae_points: Vec<MinutiaPoint>,
}

impl FingerprintTemplate {
    pub fn new(minutiae_points: Vec<MinutiaPoint>) -> Self {
        Self { minutiae_points }
    }

    /// Parse a template from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::TemplateParse(e.to_string()))
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn len(&self) -> usize {
        self.minutiae_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minutiae_points.is_empty()
    }
}

/// A credential record as signed by its issuer.
///
/// Field order is part of the canonical serialization and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// `0x`-prefixed Keccak-256 digest identifying the credential.
    pub id: String,
    pub holder: Address,
    pub issuer: Address,
    /// RFC 3339 issuance timestamp.
    pub created: String,
    pub epoch: u64,
    /// Arbitrary JSON claim about the holder.
    pub claim: serde_json::Value,
}

impl Credential {
    /// Canonical byte serialization: compact JSON in declared field order.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }
}
