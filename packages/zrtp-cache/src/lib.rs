//! # ZRTP Cache
//!
//! Persistent trust state for the ZRTP key-agreement protocol: our own
//! identifier, the retained secrets shared with each remote peer, and the
//! names users bound to those peers.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ZRTP CACHE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   protocol engine                                                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  storage::CacheBackend                                          │   │
//! │  │                                                                 │   │
//! │  │  read_or_create_local_identity ──► Identifier                   │   │
//! │  │  read/insert/update_remote_trust ◄─► RemoteTrustRecord          │   │
//! │  │  read/insert/update_name_binding ◄─► NameBinding                │   │
//! │  │  open_enumeration ──► TrustCursor                               │   │
//! │  └───────────────────────────────┬─────────────────────────────────┘   │
//! │                                  │                                     │
//! │  ┌─────────────┐  ┌──────────────▼──────┐  ┌─────────────────────┐    │
//! │  │ identifier  │  │ storage::SqliteCache│  │ error               │    │
//! │  │             │  │                     │  │                     │    │
//! │  │ - 12-byte   │──│ - rusqlite          │──│ - StorageError      │    │
//! │  │   ZID       │  │ - schema versions   │  │ - ConsistencyError  │    │
//! │  │ - base64    │  │ - keyset cursor     │  │ - ...               │    │
//! │  └─────────────┘  └─────────────────────┘  └─────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`identifier`] - ZID type and its text codec
//! - [`storage`] - Cache backend trait, SQLite implementation, records
//! - [`time`] - Wall-clock helpers
//!
//! ## Example
//!
//! ```no_run
//! use zrtp_cache::{CacheBackend, Identifier, RemoteTrustRecord, SqliteCache};
//!
//! # fn main() -> zrtp_cache::Result<()> {
//! let cache = SqliteCache::open("zid.db")?;
//! let local = cache.read_or_create_local_identity(None)?;
//! let remote = Identifier::new(*b"remote-peer!");
//!
//! if cache.read_remote_trust(&remote, &local)?.is_none() {
//!     let record = RemoteTrustRecord { flags: 1, ..Default::default() };
//!     cache.insert_remote_trust(&remote, &local, &record)?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod error;
pub mod identifier;
pub mod storage;
/// Wall-clock time helpers.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use error::{Error, Result};
pub use identifier::Identifier;
pub use storage::{
    flags, CacheBackend, CacheConfig, CursorPosition, MitmKey, NameBinding, RemoteTrustRecord,
    RetainedSecret, Secret, SqliteCache, TrustCursor, TrustEntry,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of the crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        schema_version: storage::SCHEMA_VERSION,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Cache schema version this build writes
    pub schema_version: i32,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
        assert_eq!(info.schema_version, 1);
    }
}
