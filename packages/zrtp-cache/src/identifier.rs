//! # Identifiers
//!
//! The 12-byte ZID that names a protocol endpoint, and the text codec used to
//! store it.
//!
//! ## Storage Form
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       IDENTIFIER ENCODING                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   raw ZID (12 bytes)                                                    │
//! │   ┌──┬──┬──┬──┬──┬──┬──┬──┬──┬──┬──┬──┐                                 │
//! │   │0f│a3│..│..│..│..│..│..│..│..│..│7c│                                 │
//! │   └──┴──┴──┴──┴──┴──┴──┴──┴──┴──┴──┴──┘                                 │
//! │            │                                                            │
//! │            ▼  standard base64 (4 chars per 3 bytes)                     │
//! │                                                                         │
//! │   "D6Pq...3Hx8" style text, always 16 characters                        │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   TEXT key column (local_identity / remote_trust / name_binding)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Twelve bytes is a multiple of three, so the encoded form never carries
//! padding and its length is fixed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Length of a raw identifier in bytes
pub const IDENTIFIER_LEN: usize = 12;

/// Length of an encoded identifier in characters
pub const ENCODED_IDENTIFIER_LEN: usize = IDENTIFIER_LEN / 3 * 4;

/// Encode arbitrary bytes to the text form used in the cache
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode text produced by [`encode`] back to bytes
pub fn decode(text: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(text)?)
}

/// A ZRTP identifier (ZID)
///
/// Names either our own endpoint (a local identity) or a remote peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    /// Wrap raw identifier bytes
    pub const fn new(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh identifier from the operating system's CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; IDENTIFIER_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Build an identifier from a slice of exactly [`IDENTIFIER_LEN`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; IDENTIFIER_LEN] = bytes.try_into().map_err(|_| {
            Error::InvalidIdentifier(format!(
                "expected {} bytes, got {}",
                IDENTIFIER_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Parse the stored text form
    pub fn from_base64(text: &str) -> Result<Self> {
        Self::from_slice(&decode(text)?)
    }

    /// The stored text form
    pub fn to_base64(&self) -> String {
        encode(&self.0)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }
}

impl From<[u8; IDENTIFIER_LEN]> for Identifier {
    fn from(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identifier({})", hex::encode(self.0))
    }
}

impl std::str::FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_roundtrip() {
        for seed in [0u8, 1, 0x7f, 0x80, 0xfe, 0xff] {
            let bytes: Vec<u8> = (0..IDENTIFIER_LEN as u8).map(|i| i.wrapping_mul(seed)).collect();
            assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }

    #[test]
    fn test_encoded_length_is_fixed() {
        assert_eq!(ENCODED_IDENTIFIER_LEN, 16);
        for _ in 0..32 {
            let id = Identifier::generate();
            let text = id.to_base64();
            assert_eq!(text.len(), ENCODED_IDENTIFIER_LEN);
            assert!(!text.ends_with('='));
        }
    }

    #[test]
    fn test_known_encoding() {
        let id = Identifier::new(*b"hello world!");
        assert_eq!(id.to_base64(), "aGVsbG8gd29ybGQh");
        assert_eq!(Identifier::from_base64("aGVsbG8gd29ybGQh").unwrap(), id);
    }

    #[test]
    fn test_from_base64_rejects_wrong_length() {
        let short = encode(&[1u8; 9]);
        let err = Identifier::from_base64(&short).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn test_from_base64_rejects_garbage() {
        let err = Identifier::from_base64("not*base64!").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn test_generate_is_unpredictable() {
        let a = Identifier::generate();
        let b = Identifier::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_is_hex() {
        let id = Identifier::new([0xab; IDENTIFIER_LEN]);
        assert_eq!(format!("{}", id), "ab".repeat(IDENTIFIER_LEN));
    }

    #[test]
    fn test_serde_uses_base64_text() {
        let id = Identifier::new(*b"hello world!");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"aGVsbG8gd29ybGQh\"");

        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
