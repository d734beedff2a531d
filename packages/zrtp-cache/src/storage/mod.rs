//! # Storage Module
//!
//! Persistent trust state for the key-agreement protocol.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  CacheBackend (trait)                                           │   │
//! │  │  ────────────────────                                           │   │
//! │  │                                                                 │   │
//! │  │  clear · local identity · remote trust · name binding           │   │
//! │  │  open_enumeration ──► TrustCursor (lazy, newest trust first)    │   │
//! │  └───────────────────────────────┬─────────────────────────────────┘   │
//! │                                  │                                     │
//! │  ┌───────────────────────────────▼─────────────────────────────────┐   │
//! │  │  SqliteCache                                                    │   │
//! │  │  ───────────                                                    │   │
//! │  │                                                                 │   │
//! │  │  Tables:                                                        │   │
//! │  │  • local_identity - Our ZID per account                         │   │
//! │  │  • remote_trust - Retained secrets per (remote, local) pair     │   │
//! │  │  • name_binding - Display names per (remote, local, account)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Absence is never an error: lookups return `Ok(None)` when no row matches.
//! More than one row for a composite key is reported as
//! [`Error::ConsistencyError`](crate::Error::ConsistencyError) and never
//! resolved by picking one.

mod cursor;
mod database;
pub mod records;
mod schema;

pub use cursor::{CursorPosition, TrustCursor, TrustEntry};
pub use database::{CacheConfig, SqliteCache};
pub use records::{
    flags, LocalIdentityKind, MitmKey, NameBinding, RemoteTrustRecord, RetainedSecret, Secret,
    DEFAULT_ACCOUNT, MAX_NAME_LEN, SECRET_LEN,
};
pub use schema::SCHEMA_VERSION;

use crate::error::Result;
use crate::identifier::Identifier;

/// Operations every cache engine provides
///
/// One implementation per storage engine. All calls are synchronous and
/// serialised by the implementation.
pub trait CacheBackend: Send {
    /// Release the engine connection
    ///
    /// Idempotent. Errors are logged, not returned. Every later call fails
    /// with [`Error::CacheClosed`](crate::Error::CacheClosed).
    fn close(&mut self);

    /// Discard all state and start over with empty tables
    ///
    /// The next [`read_or_create_local_identity`](Self::read_or_create_local_identity)
    /// mints a new identifier.
    fn clear(&self) -> Result<()>;

    /// Return our identifier for `account`, creating it on first use
    ///
    /// `None`, `Some("")` and `Some(DEFAULT_ACCOUNT)` name the same standalone
    /// identity.
    fn read_or_create_local_identity(&self, account: Option<&str>) -> Result<Identifier>;

    /// Look up the trust record for a (remote, local) pair
    fn read_remote_trust(
        &self,
        remote: &Identifier,
        local: &Identifier,
    ) -> Result<Option<RemoteTrustRecord>>;

    /// Store a new trust record
    ///
    /// Fails with a storage error if the pair already has one.
    fn insert_remote_trust(
        &self,
        remote: &Identifier,
        local: &Identifier,
        record: &RemoteTrustRecord,
    ) -> Result<()>;

    /// Replace every field of an existing trust record
    fn update_remote_trust(
        &self,
        remote: &Identifier,
        local: &Identifier,
        record: &RemoteTrustRecord,
    ) -> Result<()>;

    /// Look up the name bound to a (remote, local, account) triple
    fn read_name_binding(
        &self,
        remote: &Identifier,
        local: &Identifier,
        account: Option<&str>,
    ) -> Result<Option<NameBinding>>;

    /// Store a new name binding, stamping `last_update` with the current time
    fn insert_name_binding(
        &self,
        remote: &Identifier,
        local: &Identifier,
        account: Option<&str>,
        binding: &NameBinding,
    ) -> Result<()>;

    /// Replace flags and name of a binding, refreshing `last_update`
    fn update_name_binding(
        &self,
        remote: &Identifier,
        local: &Identifier,
        account: Option<&str>,
        binding: &NameBinding,
    ) -> Result<()>;

    /// Start a walk over every remote trust record
    fn open_enumeration(&self) -> Result<TrustCursor<'_>>;

    /// Fetch the record that follows `after` in enumeration order
    ///
    /// `None` asks for the first record. Used by [`TrustCursor`].
    fn next_remote_trust(
        &self,
        after: Option<CursorPosition>,
    ) -> Result<Option<(CursorPosition, Identifier, RemoteTrustRecord)>>;
}
