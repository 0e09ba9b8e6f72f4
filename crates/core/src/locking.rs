//! Row-lock policy constants, staleness predicate, and lock DTOs.
//!
//! This module lives in `core` (zero internal deps) so that the repository
//! layer, API handlers, and the background reaper all reference the same
//! timeout and the same notion of a stale lock. The lock itself is stored
//! inline on the business row (`is_locked` / `locked_by` / `locked_at`);
//! mutual exclusion is delegated entirely to database row locks, never to
//! in-process synchronization, so multiple server instances stay correct.

use serde::Serialize;

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Lock policy constants
// ---------------------------------------------------------------------------

/// A held lock older than this is stale and eligible for reclamation.
pub const LOCK_TIMEOUT_SECS: i64 = 300;

/// How often the background reaper sweeps for expired locks (in seconds).
pub const REAPER_INTERVAL_SECS: u64 = 600;

/// Returns `true` if a lock acquired at `locked_at` has expired by `now`.
///
/// Stale locks are treated as absent for acquisition purposes; the prior
/// holder and time may still be reported for UX messaging.
pub fn is_stale(locked_at: Timestamp, now: Timestamp, timeout_secs: i64) -> bool {
    now.signed_duration_since(locked_at) > chrono::Duration::seconds(timeout_secs)
}

// ---------------------------------------------------------------------------
// Lock DTOs
// ---------------------------------------------------------------------------

/// A successfully acquired (or refreshed) row lock.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LockInfo {
    pub locked_by: DbId,
    pub locked_at: Timestamp,
}

/// Read-only lock state for a row, as seen by a particular caller.
///
/// `editable` is true iff the row is unlocked, locked by the caller, or the
/// lock is stale.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LockStatus {
    pub editable: bool,
    pub locked: bool,
    pub holder: Option<DbId>,
    pub acquired_at: Option<Timestamp>,
}

impl LockStatus {
    /// An unlocked row: anyone may edit.
    pub fn unlocked() -> Self {
        Self {
            editable: true,
            locked: false,
            holder: None,
            acquired_at: None,
        }
    }

    /// Derive the status a caller sees for a held lock.
    pub fn held(
        holder: DbId,
        acquired_at: Timestamp,
        viewer: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Self {
        let editable = holder == viewer || is_stale(acquired_at, now, timeout_secs);
        Self {
            editable,
            locked: true,
            holder: Some(holder),
            acquired_at: Some(acquired_at),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-entity concurrency policy
// ---------------------------------------------------------------------------

/// The two concurrency schemes observed in the data model, named explicitly
/// and selected per entity type rather than per route.
///
/// - `Pessimistic`: edits must hold the row lock; conflicting editors are
///   blocked with a `Locked` error.
/// - `Optimistic`: edits proceed unconditionally; a version counter detects
///   concurrent modification and the conflict is surfaced as a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    Pessimistic,
    Optimistic,
}
