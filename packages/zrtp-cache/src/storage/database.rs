//! # SQLite Cache
//!
//! The SQLite implementation of [`CacheBackend`].
//!
//! ## Open Sequence
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          OPEN / CLEAR                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  open(path)                                                             │
//! │     │                                                                   │
//! │     ├── cannot open read-write ───────────────► StorageUnavailable      │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  local_identity table present?                                          │
//! │     │                                                                   │
//! │     ├── no ──► create local_identity                                    │
//! │     │          drop remote_trust, name_binding (errors ignored)         │
//! │     │          create remote_trust, name_binding                        │
//! │     │          user_version = SCHEMA_VERSION                            │
//! │     │                                                                   │
//! │     └── yes ─► recreate any missing remote table                        │
//! │                run pending migrations                                   │
//! │                                                                         │
//! │  clear() = drop local_identity, then the "no" branch above              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement goes through the connection's prepared-statement cache.
//! Identifiers are bound as base64 text, secrets as 32-byte blobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use super::cursor::{CursorPosition, TrustCursor};
use super::records::{
    account_or_default, normalize_account, LocalIdentityKind, MitmKey, NameBinding,
    RemoteTrustRecord, RetainedSecret, Secret,
};
use super::schema;
use super::CacheBackend;
use crate::error::{Error, Result};
use crate::identifier::Identifier;

/// Statements kept prepared per connection
const STATEMENT_CACHE_CAPACITY: usize = 16;

/// Cache configuration
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Path to the cache file (None for in-memory)
    pub path: Option<PathBuf>,
    /// Run table creation and resets inside a single transaction
    pub transactional_reset: bool,
    /// How long SQLite retries when another process holds the lock
    pub busy_timeout: Option<Duration>,
}

impl CacheConfig {
    /// Configuration for a cache file at `path`
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }
}

/// SQLite-backed ZID cache
///
/// Owns a single connection. Calls are serialised on an internal mutex; the
/// cache never runs work in the background.
pub struct SqliteCache {
    /// The underlying SQLite connection, `None` once closed
    conn: Mutex<Option<Connection>>,
    config: CacheConfig,
}

impl SqliteCache {
    /// Open or create the cache file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(CacheConfig::with_path(path))
    }

    /// Open an in-memory cache (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_config(CacheConfig::default())
    }

    /// Open a cache with explicit configuration
    ///
    /// Any failure to open the file or to bring its schema up to date is
    /// reported as [`Error::StorageUnavailable`].
    pub fn open_with_config(config: CacheConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| {
                Error::StorageUnavailable(format!(
                    "Failed to open cache {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::StorageUnavailable(format!("Failed to create in-memory cache: {}", e))
            })?,
        };

        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
        if let Some(timeout) = config.busy_timeout {
            conn.busy_timeout(timeout).map_err(|e| {
                Error::StorageUnavailable(format!("Failed to set busy timeout: {}", e))
            })?;
        }

        let cache = Self {
            conn: Mutex::new(None),
            config,
        };

        cache.init_schema(&conn).map_err(|e| match e {
            Error::StorageError(msg) | Error::StorageCorrupted(msg) => {
                Error::StorageUnavailable(msg)
            }
            other => other,
        })?;

        *cache.conn.lock() = Some(conn);

        match &cache.config.path {
            Some(path) => tracing::info!("ZID cache opened at {}", path.display()),
            None => tracing::info!("In-memory ZID cache opened"),
        }

        Ok(cache)
    }

    /// Whether [`CacheBackend::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }

    /// Schema version recorded in the cache file
    pub fn schema_version(&self) -> Result<i32> {
        self.with_conn(|conn| {
            conn.query_row("PRAGMA user_version", [], |row| row.get(0))
                .map_err(db_err("Failed to read schema version"))
        })
    }

    /// Number of remote trust records
    pub fn remote_trust_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.prepare_cached(schema::COUNT_REMOTE_TRUST)
                .and_then(|mut stmt| stmt.query_row([], |row| row.get::<_, i64>(0)))
                .map(|count| count.max(0) as u64)
                .map_err(db_err("Failed to count remote trust records"))
        })
    }

    /// Run `f` with the open connection
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(Error::CacheClosed)?;
        f(conn)
    }

    // ========================================================================
    // SCHEMA
    // ========================================================================

    fn init_schema(&self, conn: &Connection) -> Result<()> {
        if !table_exists(conn, schema::LOCAL_IDENTITY_TABLE)? {
            tracing::info!("No local identity table found, creating ZID cache tables");
            return self.reset_tables(conn, false);
        }

        // A reset interrupted by a crash can leave the remote tables missing.
        if !table_exists(conn, schema::REMOTE_TRUST_TABLE)? {
            tracing::warn!("remote_trust table missing, recreating it");
            conn.execute_batch(schema::CREATE_REMOTE_TRUST)
                .map_err(db_err("Failed to create remote_trust"))?;
        }
        if !table_exists(conn, schema::NAME_BINDING_TABLE)? {
            tracing::warn!("name_binding table missing, recreating it");
            conn.execute_batch(schema::CREATE_NAME_BINDING)
                .map_err(db_err("Failed to create name_binding"))?;
        }

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(db_err("Failed to read schema version"))?;

        match version {
            v if v < schema::SCHEMA_VERSION => migrate(conn, v),
            v if v > schema::SCHEMA_VERSION => {
                tracing::warn!(
                    "ZID cache schema version {} is newer than supported {}",
                    v,
                    schema::SCHEMA_VERSION
                );
                Ok(())
            }
            v => {
                tracing::debug!("ZID cache schema version: {}", v);
                Ok(())
            }
        }
    }

    /// Create the local identity table and start the remote tables from scratch
    ///
    /// With `drop_local_identity` the existing local identity table goes first,
    /// which is what [`CacheBackend::clear`] does.
    fn reset_tables(&self, conn: &Connection, drop_local_identity: bool) -> Result<()> {
        let run = |conn: &Connection| -> Result<()> {
            if drop_local_identity {
                ignore_drop(conn, schema::DROP_LOCAL_IDENTITY);
            }
            conn.execute_batch(schema::CREATE_LOCAL_IDENTITY)
                .map_err(db_err("Failed to create local_identity"))?;

            // Remote records reference the old local ZID and must not survive it.
            ignore_drop(conn, schema::DROP_REMOTE_TRUST);
            ignore_drop(conn, schema::DROP_NAME_BINDING);

            conn.execute_batch(schema::CREATE_REMOTE_TRUST)
                .map_err(db_err("Failed to create remote_trust"))?;
            conn.execute_batch(schema::CREATE_NAME_BINDING)
                .map_err(db_err("Failed to create name_binding"))?;

            conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)
                .map_err(db_err("Failed to set schema version"))?;
            Ok(())
        };

        conn.flush_prepared_statement_cache();

        if self.config.transactional_reset {
            let tx = conn
                .unchecked_transaction()
                .map_err(db_err("Failed to begin reset transaction"))?;
            run(&*tx)?;
            tx.commit().map_err(db_err("Failed to commit reset"))?;
        } else {
            run(conn)?;
        }

        tracing::info!(
            "ZID cache tables created (version {})",
            schema::SCHEMA_VERSION
        );
        Ok(())
    }
}

impl Drop for SqliteCache {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// CACHE OPERATIONS
// ============================================================================

impl CacheBackend for SqliteCache {
    fn close(&mut self) {
        let Some(conn) = self.conn.get_mut().take() else {
            return;
        };
        match conn.close() {
            Ok(()) => tracing::debug!("ZID cache closed"),
            Err((_conn, e)) => tracing::warn!("Failed to close ZID cache cleanly: {}", e),
        }
    }

    fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            self.reset_tables(conn, true)?;
            tracing::info!("ZID cache cleared, all local and remote state discarded");
            Ok(())
        })
    }

    fn read_or_create_local_identity(&self, account: Option<&str>) -> Result<Identifier> {
        let (kind, label) = normalize_account(account);

        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(schema::SELECT_LOCAL_IDENTITY)
                .map_err(db_err("Failed to prepare local identity query"))?;
            let rows = stmt
                .query_map(params![kind, label], |row| row.get::<_, Identifier>(0))
                .map_err(db_err("Failed to query local identity"))?;

            let existing = at_most_one(rows, "Failed to read local identity", |found| {
                format!(
                    "found {} local identities for account '{}'",
                    found, label
                )
            })?;
            if let Some(zid) = existing {
                return Ok(zid);
            }

            let zid = Identifier::generate();
            conn.prepare_cached(schema::INSERT_LOCAL_IDENTITY)
                .and_then(|mut stmt| stmt.execute(params![zid, kind, label]))
                .map_err(db_err("Failed to store local identity"))?;

            tracing::info!("Created local identity {} for account '{}'", zid, label);
            Ok(zid)
        })
    }

    fn read_remote_trust(
        &self,
        remote: &Identifier,
        local: &Identifier,
    ) -> Result<Option<RemoteTrustRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(schema::SELECT_REMOTE_TRUST)
                .map_err(db_err("Failed to prepare remote trust query"))?;
            let rows = stmt
                .query_map(params![remote, local], |row| remote_trust_from_row(row, 0))
                .map_err(db_err("Failed to query remote trust"))?;

            at_most_one(rows, "Failed to read remote trust record", |found| {
                format!(
                    "found {} remote trust records for remote {} and local {}",
                    found, remote, local
                )
            })
        })
    }

    fn insert_remote_trust(
        &self,
        remote: &Identifier,
        local: &Identifier,
        record: &RemoteTrustRecord,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(schema::INSERT_REMOTE_TRUST)
                .and_then(|mut stmt| {
                    stmt.execute(params![
                        remote,
                        local,
                        record.flags,
                        record.rs1.value,
                        record.rs1.last_used,
                        record.rs1.time_to_live,
                        record.rs2.value,
                        record.rs2.last_used,
                        record.rs2.time_to_live,
                        record.mitm_key.value,
                        record.mitm_key.last_used,
                        record.secure_since,
                        record.preshared_counter,
                    ])
                })
                .map_err(db_err("Failed to insert remote trust record"))?;

            tracing::debug!("Inserted remote trust record for {} (local {})", remote, local);
            Ok(())
        })
    }

    fn update_remote_trust(
        &self,
        remote: &Identifier,
        local: &Identifier,
        record: &RemoteTrustRecord,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn
                .prepare_cached(schema::UPDATE_REMOTE_TRUST)
                .and_then(|mut stmt| {
                    stmt.execute(params![
                        remote,
                        local,
                        record.flags,
                        record.rs1.value,
                        record.rs1.last_used,
                        record.rs1.time_to_live,
                        record.rs2.value,
                        record.rs2.last_used,
                        record.rs2.time_to_live,
                        record.mitm_key.value,
                        record.mitm_key.last_used,
                        record.secure_since,
                        record.preshared_counter,
                    ])
                })
                .map_err(db_err("Failed to update remote trust record"))?;

            match changed {
                0 => tracing::warn!("No remote trust record to update for {} (local {})", remote, local),
                1 => tracing::debug!("Updated remote trust record for {} (local {})", remote, local),
                n => {
                    return Err(Error::ConsistencyError(format!(
                        "update touched {} remote trust records for remote {} and local {}",
                        n, remote, local
                    )))
                }
            }
            Ok(())
        })
    }

    fn read_name_binding(
        &self,
        remote: &Identifier,
        local: &Identifier,
        account: Option<&str>,
    ) -> Result<Option<NameBinding>> {
        let account = account_or_default(account);

        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(schema::SELECT_NAME_BINDING)
                .map_err(db_err("Failed to prepare name binding query"))?;
            let rows = stmt
                .query_map(params![remote, local, account], |row| {
                    Ok(NameBinding {
                        flags: row.get(0)?,
                        last_update: row.get(1)?,
                        name: NameBinding::name_from_stored(row.get(2)?),
                    })
                })
                .map_err(db_err("Failed to query name binding"))?;

            at_most_one(rows, "Failed to read name binding", |found| {
                format!(
                    "found {} name bindings for remote {}, local {}, account '{}'",
                    found, remote, local, account
                )
            })
        })
    }

    fn insert_name_binding(
        &self,
        remote: &Identifier,
        local: &Identifier,
        account: Option<&str>,
        binding: &NameBinding,
    ) -> Result<()> {
        let account = account_or_default(account);
        let name = binding.stored_name()?;
        let now = crate::time::now_timestamp();

        self.with_conn(|conn| {
            conn.prepare_cached(schema::INSERT_NAME_BINDING)
                .and_then(|mut stmt| {
                    stmt.execute(params![remote, local, account, binding.flags, now, name])
                })
                .map_err(db_err("Failed to insert name binding"))?;

            tracing::debug!("Inserted name binding for {} (local {})", remote, local);
            Ok(())
        })
    }

    fn update_name_binding(
        &self,
        remote: &Identifier,
        local: &Identifier,
        account: Option<&str>,
        binding: &NameBinding,
    ) -> Result<()> {
        let account = account_or_default(account);
        let name = binding.stored_name()?;
        let now = crate::time::now_timestamp();

        self.with_conn(|conn| {
            let changed = conn
                .prepare_cached(schema::UPDATE_NAME_BINDING)
                .and_then(|mut stmt| {
                    stmt.execute(params![remote, local, account, binding.flags, now, name])
                })
                .map_err(db_err("Failed to update name binding"))?;

            match changed {
                0 => tracing::warn!("No name binding to update for {} (local {})", remote, local),
                1 => tracing::debug!("Updated name binding for {} (local {})", remote, local),
                n => {
                    return Err(Error::ConsistencyError(format!(
                        "update touched {} name bindings for remote {}, local {}, account '{}'",
                        n, remote, local, account
                    )))
                }
            }
            Ok(())
        })
    }

    fn open_enumeration(&self) -> Result<TrustCursor<'_>> {
        self.with_conn(|conn| {
            conn.prepare_cached(schema::SELECT_REMOTE_TRUST_FIRST)
                .map(drop)
                .map_err(db_err("Failed to prepare trust enumeration"))
        })?;
        Ok(TrustCursor::new(self))
    }

    fn next_remote_trust(
        &self,
        after: Option<CursorPosition>,
    ) -> Result<Option<(CursorPosition, Identifier, RemoteTrustRecord)>> {
        self.with_conn(|conn| {
            let Some(pos) = after else {
                return conn
                    .prepare_cached(schema::SELECT_REMOTE_TRUST_FIRST)
                    .and_then(|mut stmt| stmt.query_row([], enumeration_row).optional())
                    .map_err(db_err("Failed to read first remote trust record"));
            };

            // Two index seeks: the rest of the current secure_since group,
            // then the head of the next older group.
            let tied = conn
                .prepare_cached(schema::SELECT_REMOTE_TRUST_NEXT_TIED)
                .and_then(|mut stmt| {
                    stmt.query_row(params![pos.secure_since, pos.tiebreak], enumeration_row)
                        .optional()
                })
                .map_err(db_err("Failed to read next remote trust record"))?;
            if tied.is_some() {
                return Ok(tied);
            }

            conn.prepare_cached(schema::SELECT_REMOTE_TRUST_NEXT_OLDER)
                .and_then(|mut stmt| {
                    stmt.query_row(params![pos.secure_since], enumeration_row)
                        .optional()
                })
                .map_err(db_err("Failed to read next remote trust record"))
        })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Map a rusqlite error, keeping decode failures distinct from engine failures
fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| match e {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => {
            Error::StorageCorrupted(format!("{}: {}", context, e))
        }
        other => Error::StorageError(format!("{}: {}", context, other)),
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        schema::LOOKUP_TABLE,
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(db_err("Failed to look up cache tables"))
}

/// Drop a table, ignoring failures such as "no such table"
fn ignore_drop(conn: &Connection, sql: &str) {
    if let Err(e) = conn.execute_batch(sql) {
        tracing::debug!("Ignoring '{}': {}", sql, e);
    }
}

/// Bring an existing cache up to [`schema::SCHEMA_VERSION`]
fn migrate(conn: &Connection, from: i32) -> Result<()> {
    tracing::info!(
        "ZID cache schema version {} is older than current {}, running migrations",
        from,
        schema::SCHEMA_VERSION
    );

    if from < 1 {
        tracing::info!("Running migration v0 → v1 (composite key indexes)");
        let tx = conn
            .unchecked_transaction()
            .map_err(db_err("Failed to begin migration"))?;
        if let Err(e) = tx.execute_batch(schema::MIGRATE_V0_TO_V1) {
            // Existing duplicate rows block the unique indexes. Leave the cache
            // at v0; reads still report the duplicates as ConsistencyError.
            tracing::warn!("Migration v0 → v1 skipped: {}", e);
            return Ok(());
        }
        tx.pragma_update(None, "user_version", 1)
            .map_err(db_err("Failed to set schema version"))?;
        tx.commit().map_err(db_err("Failed to commit migration"))?;
    }

    tracing::info!(
        "All migrations complete (now at version {})",
        schema::SCHEMA_VERSION
    );
    Ok(())
}

/// Take the single row a unique-key lookup may return
///
/// More than one row is a [`Error::ConsistencyError`]; the extra rows are
/// counted, never silently discarded.
fn at_most_one<T>(
    mut rows: impl Iterator<Item = rusqlite::Result<T>>,
    context: &'static str,
    describe: impl FnOnce(usize) -> String,
) -> Result<Option<T>> {
    let map = db_err(context);
    let first = match rows.next() {
        None => return Ok(None),
        Some(row) => row.map_err(&map)?,
    };

    let mut found = 1;
    for row in rows {
        row.map_err(&map)?;
        found += 1;
    }

    if found > 1 {
        return Err(Error::ConsistencyError(describe(found)));
    }
    Ok(Some(first))
}

/// Decode the eleven remote trust columns starting at `base`
fn remote_trust_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<RemoteTrustRecord> {
    Ok(RemoteTrustRecord {
        flags: row.get(base)?,
        rs1: RetainedSecret {
            value: row.get(base + 1)?,
            last_used: row.get(base + 2)?,
            time_to_live: row.get(base + 3)?,
        },
        rs2: RetainedSecret {
            value: row.get(base + 4)?,
            last_used: row.get(base + 5)?,
            time_to_live: row.get(base + 6)?,
        },
        mitm_key: MitmKey {
            value: row.get(base + 7)?,
            last_used: row.get(base + 8)?,
        },
        secure_since: row.get(base + 9)?,
        preshared_counter: row.get(base + 10)?,
    })
}

/// Decode one enumeration row: rowid, the record columns, remote ZID
fn enumeration_row(
    row: &Row<'_>,
) -> rusqlite::Result<(CursorPosition, Identifier, RemoteTrustRecord)> {
    let rowid: i64 = row.get(0)?;
    let record = remote_trust_from_row(row, 1)?;
    let remote: Identifier = row.get(12)?;
    Ok((
        CursorPosition::new(record.secure_since, rowid),
        remote,
        record,
    ))
}

// ============================================================================
// SQL CONVERSIONS
// ============================================================================

impl ToSql for Identifier {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_base64()))
    }
}

impl FromSql for Identifier {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Identifier::from_base64(text).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Secret {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Blob(self.as_bytes())))
    }
}

impl FromSql for Secret {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        Secret::from_slice(blob).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for LocalIdentityKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i32()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
