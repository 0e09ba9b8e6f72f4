//! Optimistic version guard.
//!
//! Every successful mutation increments a per-row version counter. A client
//! may submit the version it last read; a mismatch means someone else
//! committed in between. The guard is advisory: the write proceeds
//! (last-write-wins) and the mismatch rides the success response as a
//! warning naming the prior editor, instead of hard-blocking either user.

use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// Non-fatal warning attached to a successful mutation whose submitted
/// version did not match the stored one.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VersionMismatch {
    /// The version the client based its edit on.
    pub expected: i64,
    /// The version actually stored when the write was applied.
    pub actual: i64,
    /// Who committed the intervening change, if recorded.
    pub updated_by: Option<DbId>,
    /// When the intervening change was committed, if recorded.
    pub updated_at: Option<Timestamp>,
}

/// Compare a client-submitted version against the stored one.
///
/// Returns `None` when no version was submitted or when they match;
/// otherwise the mismatch details. The caller proceeds with the write
/// regardless.
pub fn check(
    expected: Option<i64>,
    actual: i64,
    updated_by: Option<DbId>,
    updated_at: Option<Timestamp>,
) -> Option<VersionMismatch> {
    match expected {
        Some(expected) if expected != actual => Some(VersionMismatch {
            expected,
            actual,
            updated_by,
            updated_at,
        }),
        _ => None,
    }
}
