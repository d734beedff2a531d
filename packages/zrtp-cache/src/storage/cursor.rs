//! # Enumeration Cursor
//!
//! Forward-only walk over every remote trust record, most recently trusted
//! peer first.
//!
//! ```text
//! open_enumeration()                advance()                  close()
//!       │                              │                          │
//!       ▼                              ▼                          ▼
//!  ┌──────────┐  next_remote_trust  ┌──────────┐   None     ┌──────────┐
//!  │  Fresh   │ ──────────────────► │  Open    │ ─────────► │ Finished │
//!  │ pos=None │                     │ pos=last │  or error  │          │
//!  └──────────┘                     └──────────┘            └──────────┘
//! ```
//!
//! The cursor keeps only the position of the last row it returned. Each
//! advance asks the backend for the single row after that position, so no
//! result set is buffered and nothing engine-side stays open between calls.
//! Dropping the cursor at any point releases everything it holds.

use crate::error::Result;
use crate::identifier::Identifier;

use super::records::RemoteTrustRecord;
use super::CacheBackend;

/// A remote identifier paired with its trust record
pub type TrustEntry = (Identifier, RemoteTrustRecord);

/// Position of a row in the `secure_since DESC` enumeration order
///
/// `tiebreak` orders rows that share a `secure_since` value, ascending; its
/// meaning is up to the backend (SQLite uses the rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    /// `secure_since` of the row
    pub secure_since: i64,
    /// Backend-defined tiebreak, ascending
    pub tiebreak: i64,
}

impl CursorPosition {
    /// Create a position
    pub fn new(secure_since: i64, tiebreak: i64) -> Self {
        Self {
            secure_since,
            tiebreak,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Open,
    Finished,
}

/// Lazy enumeration of `(remote, record)` pairs
///
/// Obtained from [`CacheBackend::open_enumeration`]. Not restartable: once it
/// reports the end (or an error) it stays finished.
///
/// The walk is not a snapshot. Each advance sees the table as it is at that
/// moment, so writes made during the walk can be missed or seen:
///
/// - a record not yet reached whose `secure_since` is raised above the
///   cursor position is skipped;
/// - a record already returned whose `secure_since` is lowered below the
///   cursor position is returned again;
/// - records inserted below the cursor position are returned.
pub struct TrustCursor<'a> {
    backend: &'a dyn CacheBackend,
    position: Option<CursorPosition>,
    state: CursorState,
}

impl<'a> TrustCursor<'a> {
    /// Start an enumeration over `backend`
    pub fn new(backend: &'a dyn CacheBackend) -> Self {
        Self {
            backend,
            position: None,
            state: CursorState::Open,
        }
    }

    /// Fetch the next entry, `Ok(None)` at the end
    ///
    /// An error finishes the cursor.
    pub fn advance(&mut self) -> Result<Option<TrustEntry>> {
        if self.state == CursorState::Finished {
            return Ok(None);
        }

        match self.backend.next_remote_trust(self.position) {
            Ok(Some((position, remote, record))) => {
                self.position = Some(position);
                Ok(Some((remote, record)))
            }
            Ok(None) => {
                self.state = CursorState::Finished;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Trust enumeration stopped: {}", e);
                self.state = CursorState::Finished;
                Err(e)
            }
        }
    }

    /// Whether the cursor has reached its end
    pub fn is_finished(&self) -> bool {
        self.state == CursorState::Finished
    }

    /// End the enumeration early
    pub fn close(self) {
        tracing::debug!("Trust enumeration closed (exhausted: {})", self.is_finished());
    }
}

impl Iterator for TrustCursor<'_> {
    type Item = Result<TrustEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

impl std::iter::FusedIterator for TrustCursor<'_> {}
