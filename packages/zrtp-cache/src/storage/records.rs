//! # Cache Records
//!
//! The three record kinds the cache stores.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          RECORD KINDS                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Local identity      (kind, account)          → our own ZID            │
//! │  Remote trust        (remote ZID, local ZID)  → RemoteTrustRecord      │
//! │  Name binding        (remote, local, account) → NameBinding            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Length of a retained secret or MITM key in bytes
pub const SECRET_LEN: usize = 32;

/// Account label used when the caller gives none
pub const DEFAULT_ACCOUNT: &str = "_STANDARD_";

/// Name stored when a binding carries no name
pub const NO_NAME: &str = "_NO_NAME_";

/// Maximum stored name length in bytes
pub const MAX_NAME_LEN: usize = 1000;

/// Well-known flag bits.
///
/// The cache stores flags verbatim; the meaning belongs to the protocol layer.
pub mod flags {
    /// Remote record holds valid data
    pub const VALID: u32 = 0x01;
    /// The SAS was verified by the users
    pub const SAS_VERIFIED: u32 = 0x02;
    /// Retained secret slot 1 is valid
    pub const RS1_VALID: u32 = 0x04;
    /// Retained secret slot 2 is valid
    pub const RS2_VALID: u32 = 0x08;
    /// A MITM key is available
    pub const MITM_KEY_AVAILABLE: u32 = 0x10;
    /// Record describes our own identifier
    pub const OWN_ZID_RECORD: u32 = 0x20;

    /// Name binding holds a valid name
    pub const NAME_VALID: u32 = 0x01;
}

// ============================================================================
// SECRETS
// ============================================================================

/// 32 bytes of secret material, wiped on drop
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    /// Wrap raw secret bytes
    pub const fn new(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a secret from a stored blob, which must be exactly [`SECRET_LEN`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; SECRET_LEN] = bytes.try_into().map_err(|_| {
            Error::StorageCorrupted(format!(
                "secret blob is {} bytes, expected {}",
                bytes.len(),
                SECRET_LEN
            ))
        })?;
        Ok(Self(raw))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }
}

impl From<[u8; SECRET_LEN]> for Secret {
    fn from(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// One retained-secret slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetainedSecret {
    /// The secret value
    pub value: Secret,
    /// When the secret was last used (Unix seconds)
    pub last_used: i64,
    /// When the secret expires (Unix seconds)
    pub time_to_live: i64,
}

/// MITM detection key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MitmKey {
    /// The key value
    pub value: Secret,
    /// When the key was last used (Unix seconds)
    pub last_used: i64,
}

// ============================================================================
// REMOTE TRUST
// ============================================================================

/// Accumulated trust between one local identity and one remote peer
///
/// `RemoteTrustRecord::default()` is the "no prior trust" state: zeroed flags,
/// zeroed secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteTrustRecord {
    /// Protocol-owned flag bits (see [`flags`])
    pub flags: u32,
    /// Retained secret slot 1
    pub rs1: RetainedSecret,
    /// Retained secret slot 2
    pub rs2: RetainedSecret,
    /// MITM detection key
    pub mitm_key: MitmKey,
    /// Start of continuous trust (Unix seconds)
    pub secure_since: i64,
    /// Pre-shared mode usage counter
    pub preshared_counter: u32,
}

impl RemoteTrustRecord {
    /// Check whether every bit in `mask` is set
    pub fn has_flags(&self, mask: u32) -> bool {
        self.flags & mask == mask
    }

    /// Whether the record carries valid trust data
    pub fn is_valid(&self) -> bool {
        self.has_flags(flags::VALID)
    }
}

// ============================================================================
// NAME BINDING
// ============================================================================

/// Human-readable name bound to a (remote, local, account) triple
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameBinding {
    /// Protocol-owned flag bits
    pub flags: u32,
    /// When the binding was last written (Unix seconds)
    ///
    /// Set by the cache on every insert and update; ignored on input.
    pub last_update: i64,
    /// The bound name, `None` when unnamed
    pub name: Option<String>,
}

impl NameBinding {
    /// Create a binding to write
    pub fn new(flags: u32, name: Option<&str>) -> Self {
        Self {
            flags,
            last_update: 0,
            name: name.map(str::to_string),
        }
    }

    /// The text actually stored for this binding's name
    ///
    /// Rejects names over [`MAX_NAME_LEN`] bytes instead of truncating them.
    pub(crate) fn stored_name(&self) -> Result<&str> {
        match self.name.as_deref() {
            None => Ok(NO_NAME),
            Some(name) if name.len() > MAX_NAME_LEN => Err(Error::NameTooLong {
                length: name.len(),
                max: MAX_NAME_LEN,
            }),
            Some(name) => Ok(name),
        }
    }

    /// Map stored name text back to the caller's view
    pub(crate) fn name_from_stored(text: String) -> Option<String> {
        if text == NO_NAME {
            None
        } else {
            Some(text)
        }
    }
}

// ============================================================================
// LOCAL IDENTITY
// ============================================================================

/// Whether a local identity is tied to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalIdentityKind {
    /// Not tied to any account
    Standalone,
    /// Bound to a specific account label
    AccountBound,
}

impl LocalIdentityKind {
    /// Stored integer value
    pub fn as_i32(self) -> i32 {
        match self {
            LocalIdentityKind::Standalone => 1,
            LocalIdentityKind::AccountBound => 2,
        }
    }
}

/// Normalize an optional account label to its stored `(kind, label)` pair
///
/// `None`, the empty string and [`DEFAULT_ACCOUNT`] all map to
/// `(Standalone, DEFAULT_ACCOUNT)`.
pub fn normalize_account(account: Option<&str>) -> (LocalIdentityKind, &str) {
    match account {
        Some(label) if !label.is_empty() && label != DEFAULT_ACCOUNT => {
            (LocalIdentityKind::AccountBound, label)
        }
        _ => (LocalIdentityKind::Standalone, DEFAULT_ACCOUNT),
    }
}

/// Account label used for name binding keys
pub fn account_or_default(account: Option<&str>) -> &str {
    normalize_account(account).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_account() {
        assert_eq!(
            normalize_account(None),
            (LocalIdentityKind::Standalone, DEFAULT_ACCOUNT)
        );
        assert_eq!(
            normalize_account(Some("")),
            (LocalIdentityKind::Standalone, DEFAULT_ACCOUNT)
        );
        assert_eq!(
            normalize_account(Some(DEFAULT_ACCOUNT)),
            (LocalIdentityKind::Standalone, DEFAULT_ACCOUNT)
        );
        assert_eq!(
            normalize_account(Some("alice@example.org")),
            (LocalIdentityKind::AccountBound, "alice@example.org")
        );
    }

    #[test]
    fn test_kind_stored_values() {
        assert_eq!(LocalIdentityKind::Standalone.as_i32(), 1);
        assert_eq!(LocalIdentityKind::AccountBound.as_i32(), 2);
    }

    #[test]
    fn test_default_record_is_absent_state() {
        let record = RemoteTrustRecord::default();
        assert_eq!(record.flags, 0);
        assert!(!record.is_valid());
        assert_eq!(record.rs1.value.as_bytes(), &[0u8; SECRET_LEN]);
    }

    #[test]
    fn test_has_flags() {
        let record = RemoteTrustRecord {
            flags: flags::VALID | flags::RS1_VALID,
            ..Default::default()
        };
        assert!(record.is_valid());
        assert!(record.has_flags(flags::VALID | flags::RS1_VALID));
        assert!(!record.has_flags(flags::RS1_VALID | flags::RS2_VALID));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new([0x41; SECRET_LEN]);
        let debug = format!("{:?}", secret);
        assert_eq!(debug, "Secret([REDACTED])");
        assert!(!debug.contains("65"));
    }

    #[test]
    fn test_secret_from_slice_checks_length() {
        assert!(Secret::from_slice(&[1u8; SECRET_LEN]).is_ok());
        let err = Secret::from_slice(&[1u8; 31]).unwrap_err();
        assert!(matches!(err, Error::StorageCorrupted(_)));
    }

    #[test]
    fn test_stored_name() {
        assert_eq!(NameBinding::new(1, None).stored_name().unwrap(), NO_NAME);
        assert_eq!(NameBinding::new(1, Some("Bob")).stored_name().unwrap(), "Bob");

        let exact = "x".repeat(MAX_NAME_LEN);
        assert!(NameBinding::new(1, Some(&exact)).stored_name().is_ok());

        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = NameBinding::new(1, Some(&long)).stored_name().unwrap_err();
        assert!(matches!(err, Error::NameTooLong { length: 1001, max: 1000 }));
    }

    #[test]
    fn test_name_from_stored() {
        assert_eq!(NameBinding::name_from_stored(NO_NAME.to_string()), None);
        assert_eq!(
            NameBinding::name_from_stored("Carol".to_string()),
            Some("Carol".to_string())
        );
    }
}
