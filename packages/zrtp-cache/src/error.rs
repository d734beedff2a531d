//! # Error Handling
//!
//! Error types for the ZID cache.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageUnavailable    - Cache file could not be opened        │
//! │  │   ├── StorageError          - SQLite refused or failed a statement  │
//! │  │   └── CacheClosed           - Operation on a closed cache           │
//! │  │                                                                      │
//! │  ├── Data Errors                                                       │
//! │  │   ├── ConsistencyError      - More than one row for a unique key    │
//! │  │   ├── StorageCorrupted      - A stored value cannot be decoded      │
//! │  │   └── InvalidIdentifier     - Bad identifier text or length         │
//! │  │                                                                      │
//! │  └── Input Errors                                                      │
//! │      └── NameTooLong           - Name exceeds the stored bound         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A missing record is never an error: lookups return `Ok(None)`.
//!
//! `ConsistencyError` means the uniqueness invariant was broken outside the
//! normal write path. Callers must surface it; the cache never picks "the
//! first row" on their behalf.

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ZID cache
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Storage Errors (100-199)
    // ========================================================================

    /// The backing file could not be opened or created read-write
    #[error("Cache storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The storage engine refused or failed an operation
    #[error("Cache storage error: {0}")]
    StorageError(String),

    /// The cache was already closed
    #[error("The cache has been closed.")]
    CacheClosed,

    // ========================================================================
    // Data Errors (200-299)
    // ========================================================================

    /// Stored data violates a uniqueness invariant
    #[error("Cache inconsistent: {0}")]
    ConsistencyError(String),

    /// A stored value could not be decoded
    #[error("Cache data corrupted: {0}")]
    StorageCorrupted(String),

    /// Identifier text or length is invalid
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // ========================================================================
    // Input Errors (300-399)
    // ========================================================================

    /// Name text exceeds the stored bound
    #[error("Name is {length} bytes, the cache stores at most {max}")]
    NameTooLong {
        /// Length of the rejected name in bytes
        length: usize,
        /// Maximum accepted length in bytes
        max: usize,
    },
}

impl Error {
    /// Numeric error code
    ///
    /// - 100-199: Storage
    /// - 200-299: Data
    /// - 300-399: Input
    pub fn code(&self) -> i32 {
        match self {
            // Storage (100-199)
            Error::StorageUnavailable(_) => 100,
            Error::StorageError(_) => 101,
            Error::CacheClosed => 102,

            // Data (200-299)
            Error::ConsistencyError(_) => 200,
            Error::StorageCorrupted(_) => 201,
            Error::InvalidIdentifier(_) => 202,

            // Input (300-399)
            Error::NameTooLong { .. } => 300,
        }
    }

    /// Check if this error is recoverable
    ///
    /// A failed statement leaves the cache usable for the next call.
    /// Everything else needs operator or caller action.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StorageError(_) | Error::NameTooLong { .. })
    }

    /// Check if this error points at damaged cache contents
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Error::ConsistencyError(_) | Error::StorageCorrupted(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::InvalidIdentifier(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::StorageUnavailable("x".into()).code(), 100);
        assert_eq!(Error::StorageError("x".into()).code(), 101);
        assert_eq!(Error::CacheClosed.code(), 102);
        assert_eq!(Error::ConsistencyError("x".into()).code(), 200);
        assert_eq!(Error::InvalidIdentifier("x".into()).code(), 202);
        assert_eq!(Error::NameTooLong { length: 2000, max: 1000 }.code(), 300);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::StorageError("busy".into()).is_recoverable());
        assert!(!Error::StorageUnavailable("denied".into()).is_recoverable());
        assert!(!Error::ConsistencyError("dup".into()).is_recoverable());
    }

    #[test]
    fn test_integrity_failures() {
        assert!(Error::ConsistencyError("dup".into()).is_integrity_failure());
        assert!(Error::StorageCorrupted("blob".into()).is_integrity_failure());
        assert!(!Error::CacheClosed.is_integrity_failure());
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::StorageError(_)));
        assert!(err.to_string().contains("Query returned no rows"));
    }

    #[test]
    fn test_name_too_long_message() {
        let err = Error::NameTooLong { length: 1200, max: 1000 };
        assert_eq!(
            err.to_string(),
            "Name is 1200 bytes, the cache stores at most 1000"
        );
    }
}
