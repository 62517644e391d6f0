//! Address normalization: every account string becomes a `pol_` address.
//!
//! Accepted inputs (surrounding whitespace ignored):
//!
//! | Input | Example |
//! |-------|---------|
//! | canonical | `pol_1111111111111111111111111111111111111111` |
//! | hex prefixed | `0x1111111111111111111111111111111111111111` |
//! | bare hex | `1111111111111111111111111111111111111111` |
//!
//! The payload is stored as 20 raw bytes, so the canonical form is always
//! lowercase and `normalize(normalize(x).as_str()) == normalize(x)`.

use crate::error::ConnectError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub const CANONICAL_PREFIX: &str = "pol_";
pub const HEX_PREFIX: &str = "0x";
/// Payload length in bytes (40 hex chars).
pub const PAYLOAD_LEN: usize = 20;

fn shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^(?:pol_|0[xX])?([0-9a-fA-F]{40})$").expect("static address regex")
    })
}

/// Validated account in the application's canonical representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalAddress([u8; PAYLOAD_LEN]);

/// Normalize a raw account string into a [`CanonicalAddress`].
pub fn normalize(raw: &str) -> Result<CanonicalAddress, ConnectError> {
    let trimmed = raw.trim();
    let payload = shape()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ConnectError::InvalidFormat(raw.to_string()))?;
    let mut bytes = [0u8; PAYLOAD_LEN];
    hex::decode_to_slice(payload.as_str(), &mut bytes)
        .map_err(|_| ConnectError::InvalidFormat(raw.to_string()))?;
    Ok(CanonicalAddress(bytes))
}

impl CanonicalAddress {
    pub fn from_bytes(bytes: [u8; PAYLOAD_LEN]) -> Self { Self(bytes) }

    pub fn as_bytes(&self) -> &[u8; PAYLOAD_LEN] { &self.0 }

    /// `0x` form, for handing the account back to the wallet (e.g. a transaction `from`).
    pub fn to_hex(&self) -> String {
        format!("{}{}", HEX_PREFIX, hex::encode(self.0))
    }

    /// Display form: `pol_12...abcd` (prefix plus two hex digits, last four).
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CANONICAL_PREFIX, hex::encode(self.0))
    }
}

impl FromStr for CanonicalAddress {
    type Err = ConnectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { normalize(s) }
}

impl TryFrom<String> for CanonicalAddress {
    type Error = ConnectError;
    fn try_from(value: String) -> Result<Self, Self::Error> { normalize(&value) }
}

impl From<CanonicalAddress> for String {
    fn from(address: CanonicalAddress) -> Self { address.to_string() }
}
