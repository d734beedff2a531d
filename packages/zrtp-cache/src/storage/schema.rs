//! # Database Schema
//!
//! SQL for the three cache tables.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐  │
//! │  │ local_identity  │   │    remote_trust      │   │  name_binding   │  │
//! │  ├─────────────────┤   ├──────────────────────┤   ├─────────────────┤  │
//! │  │ local_zid       │──►│ local_zid    ┐ key   │   │ remote_zid  ┐   │  │
//! │  │ kind            │   │ remote_zid   ┘       │   │ local_zid   │key│  │
//! │  │ account         │   │ flags                │   │ account     ┘   │  │
//! │  └─────────────────┘   │ rs1, rs1_last_used,  │   │ flags           │  │
//! │                        │   rs1_ttl            │   │ last_update     │  │
//! │                        │ rs2, rs2_last_used,  │   │ name            │  │
//! │                        │   rs2_ttl            │   └─────────────────┘  │
//! │                        │ mitm_key,            │                        │
//! │                        │   mitm_last_used     │                        │
//! │                        │ secure_since         │                        │
//! │                        │ preshared_counter    │                        │
//! │                        └──────────────────────┘                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers are base64 TEXT, secrets are 32-byte BLOBs, timestamps are
//! INTEGER Unix seconds.
//!
//! `local_identity` doubles as the "cache exists" marker. When it is missing,
//! the remote and name tables are dropped and recreated, so a fresh local ZID
//! never sees trust state that belonged to the old one.

/// Current schema version, kept in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

/// Name of the table whose presence marks an initialized cache
pub const LOCAL_IDENTITY_TABLE: &str = "local_identity";

/// Name of the remote trust table
pub const REMOTE_TRUST_TABLE: &str = "remote_trust";

/// Name of the name binding table
pub const NAME_BINDING_TABLE: &str = "name_binding";

/// Probe for a table by name
pub const LOOKUP_TABLE: &str = "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1";

// ============================================================================
// LOCAL IDENTITY
// ============================================================================

/// SQL to create the local identity table
pub const CREATE_LOCAL_IDENTITY: &str = r#"
CREATE TABLE local_identity (
    -- Our ZID (base64, 16 chars)
    local_zid TEXT NOT NULL,
    -- 1 = standalone, 2 = bound to an account
    kind INTEGER NOT NULL,
    -- Account label, '_STANDARD_' for standalone identities
    account TEXT NOT NULL
);
CREATE UNIQUE INDEX idx_local_identity_key ON local_identity(kind, account);
"#;

/// SQL to drop the local identity table
pub const DROP_LOCAL_IDENTITY: &str = "DROP TABLE local_identity";

/// Find our ZID for a (kind, account) pair
pub const SELECT_LOCAL_IDENTITY: &str =
    "SELECT local_zid FROM local_identity WHERE kind = ?1 AND account = ?2";

/// Store a freshly generated ZID
pub const INSERT_LOCAL_IDENTITY: &str =
    "INSERT INTO local_identity (local_zid, kind, account) VALUES (?1, ?2, ?3)";

// ============================================================================
// REMOTE TRUST
// ============================================================================

/// SQL to drop the remote trust table
pub const DROP_REMOTE_TRUST: &str = "DROP TABLE remote_trust";

/// SQL to create the remote trust table
pub const CREATE_REMOTE_TRUST: &str = r#"
CREATE TABLE remote_trust (
    remote_zid TEXT NOT NULL,
    local_zid TEXT NOT NULL,
    -- Protocol-owned flag bits
    flags INTEGER NOT NULL,
    -- Retained secret 1
    rs1 BLOB NOT NULL,
    rs1_last_used INTEGER NOT NULL,
    rs1_ttl INTEGER NOT NULL,
    -- Retained secret 2
    rs2 BLOB NOT NULL,
    rs2_last_used INTEGER NOT NULL,
    rs2_ttl INTEGER NOT NULL,
    -- MITM detection key
    mitm_key BLOB NOT NULL,
    mitm_last_used INTEGER NOT NULL,
    -- Start of continuous trust
    secure_since INTEGER NOT NULL,
    preshared_counter INTEGER NOT NULL
);
CREATE UNIQUE INDEX idx_remote_trust_key ON remote_trust(remote_zid, local_zid);
CREATE INDEX idx_remote_trust_secure_since ON remote_trust(secure_since DESC);
"#;

/// Look up one remote record by composite key
pub const SELECT_REMOTE_TRUST: &str = r#"
SELECT flags,
       rs1, rs1_last_used, rs1_ttl,
       rs2, rs2_last_used, rs2_ttl,
       mitm_key, mitm_last_used,
       secure_since, preshared_counter
FROM remote_trust
WHERE remote_zid = ?1 AND local_zid = ?2
"#;

/// Insert one remote record
pub const INSERT_REMOTE_TRUST: &str = r#"
INSERT INTO remote_trust (
    remote_zid, local_zid, flags,
    rs1, rs1_last_used, rs1_ttl,
    rs2, rs2_last_used, rs2_ttl,
    mitm_key, mitm_last_used,
    secure_since, preshared_counter
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
"#;

/// Replace every mutable field of one remote record
pub const UPDATE_REMOTE_TRUST: &str = r#"
UPDATE remote_trust SET
    flags = ?3,
    rs1 = ?4, rs1_last_used = ?5, rs1_ttl = ?6,
    rs2 = ?7, rs2_last_used = ?8, rs2_ttl = ?9,
    mitm_key = ?10, mitm_last_used = ?11,
    secure_since = ?12, preshared_counter = ?13
WHERE remote_zid = ?1 AND local_zid = ?2
"#;

/// First row of the enumeration, most recently trusted first
///
/// Ties on `secure_since` come out in insertion order (rowid ascending), which
/// is how `idx_remote_trust_secure_since` stores them, so no sort is needed.
pub const SELECT_REMOTE_TRUST_FIRST: &str = r#"
SELECT rowid, flags,
       rs1, rs1_last_used, rs1_ttl,
       rs2, rs2_last_used, rs2_ttl,
       mitm_key, mitm_last_used,
       secure_since, preshared_counter,
       remote_zid
FROM remote_trust
ORDER BY secure_since DESC, rowid ASC
LIMIT 1
"#;

/// Next row sharing the current `secure_since` (?1 = secure_since, ?2 = rowid)
pub const SELECT_REMOTE_TRUST_NEXT_TIED: &str = r#"
SELECT rowid, flags,
       rs1, rs1_last_used, rs1_ttl,
       rs2, rs2_last_used, rs2_ttl,
       mitm_key, mitm_last_used,
       secure_since, preshared_counter,
       remote_zid
FROM remote_trust
WHERE secure_since = ?1 AND rowid > ?2
ORDER BY rowid ASC
LIMIT 1
"#;

/// First row with an older `secure_since` (?1 = secure_since)
pub const SELECT_REMOTE_TRUST_NEXT_OLDER: &str = r#"
SELECT rowid, flags,
       rs1, rs1_last_used, rs1_ttl,
       rs2, rs2_last_used, rs2_ttl,
       mitm_key, mitm_last_used,
       secure_since, preshared_counter,
       remote_zid
FROM remote_trust
WHERE secure_since < ?1
ORDER BY secure_since DESC, rowid ASC
LIMIT 1
"#;

/// Count remote records
pub const COUNT_REMOTE_TRUST: &str = "SELECT COUNT(*) FROM remote_trust";

// ============================================================================
// NAME BINDING
// ============================================================================

/// SQL to drop the name binding table
pub const DROP_NAME_BINDING: &str = "DROP TABLE name_binding";

/// SQL to create the name binding table
pub const CREATE_NAME_BINDING: &str = r#"
CREATE TABLE name_binding (
    remote_zid TEXT NOT NULL,
    local_zid TEXT NOT NULL,
    flags INTEGER NOT NULL,
    -- Refreshed on every write
    last_update INTEGER NOT NULL,
    -- Account label, '_STANDARD_' when none
    account TEXT NOT NULL,
    -- Bound name, '_NO_NAME_' when none
    name TEXT NOT NULL
);
CREATE UNIQUE INDEX idx_name_binding_key ON name_binding(remote_zid, local_zid, account);
"#;

/// Look up one name binding by composite key
pub const SELECT_NAME_BINDING: &str = r#"
SELECT flags, last_update, name
FROM name_binding
WHERE remote_zid = ?1 AND local_zid = ?2 AND account = ?3
"#;

/// Insert one name binding
pub const INSERT_NAME_BINDING: &str = r#"
INSERT INTO name_binding (remote_zid, local_zid, account, flags, last_update, name)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

/// Replace flags, timestamp and name of one binding
pub const UPDATE_NAME_BINDING: &str = r#"
UPDATE name_binding SET flags = ?4, last_update = ?5, name = ?6
WHERE remote_zid = ?1 AND local_zid = ?2 AND account = ?3
"#;

// ============================================================================
// MIGRATIONS
// ============================================================================

/// v0 → v1: composite-key uniqueness enforced by the schema
///
/// Caches created before versioning only had the read-time duplicate check.
pub const MIGRATE_V0_TO_V1: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_local_identity_key ON local_identity(kind, account);
CREATE UNIQUE INDEX IF NOT EXISTS idx_remote_trust_key ON remote_trust(remote_zid, local_zid);
CREATE INDEX IF NOT EXISTS idx_remote_trust_secure_since ON remote_trust(secure_since DESC);
CREATE UNIQUE INDEX IF NOT EXISTS idx_name_binding_key ON name_binding(remote_zid, local_zid, account);
"#;
