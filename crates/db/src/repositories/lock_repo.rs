//! Lock Store accessor: single-owner row locks stored inline on the
//! business tables (`is_locked` / `locked_by` / `locked_at`).
//!
//! Acquisition runs `SELECT ... FOR UPDATE` inside a transaction so two
//! concurrent acquirers are serialized by the database row lock; the loser
//! deterministically observes either "still locked" or "lock now held by
//! me", never a torn read. Lock operations write only the lock columns;
//! `update_by` / `update_at` are content-audit fields and stay untouched.

use sqlx::{PgConnection, PgPool};

use lastmile_core::error::CoreError;
use lastmile_core::locking::{is_stale, ConcurrencyPolicy, LockInfo, LockStatus};
use lastmile_core::types::{DbId, Timestamp};

use crate::error::MutationError;

/// The closed set of lock-bearing tables. SQL is built from this enum,
/// never from caller-supplied strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTable {
    Orders,
    Handovers,
}

impl LockTable {
    /// All lock-bearing tables, for the reaper sweep.
    pub const ALL: [LockTable; 2] = [LockTable::Orders, LockTable::Handovers];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Handovers => "handovers",
        }
    }

    /// Entity name used in `NotFound` errors.
    pub fn entity_name(&self) -> &'static str {
        match self {
            Self::Orders => "order",
            Self::Handovers => "handover",
        }
    }

    /// Concurrency scheme for rows in this table. Orders block conflicting
    /// editors; handovers let them race and surface a version warning.
    pub fn policy(&self) -> ConcurrencyPolicy {
        match self {
            Self::Orders => ConcurrencyPolicy::Pessimistic,
            Self::Handovers => ConcurrencyPolicy::Optimistic,
        }
    }
}

/// Raw lock columns of a row.
type LockRow = (bool, Option<DbId>, Option<Timestamp>);

/// Provides acquire/release/status/reap operations for row locks.
pub struct LockRepo;

impl LockRepo {
    /// Attempt to acquire the lock on a row as `user_id`.
    ///
    /// - Unlocked row: acquires.
    /// - Already held by `user_id`: re-entrant refresh (`locked_at = now`).
    /// - Held by another user within `timeout_secs`: fails with `Locked`,
    ///   carrying the holder and acquisition time for display.
    /// - Held by another user but stale: the stale lock is overwritten.
    pub async fn acquire(
        pool: &PgPool,
        table: LockTable,
        row_id: DbId,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<LockInfo, MutationError> {
        let mut tx = pool.begin().await?;
        let info = Self::acquire_on(&mut tx, table, row_id, user_id, now, timeout_secs).await?;
        tx.commit().await?;
        Ok(info)
    }

    /// Transaction-composable variant of [`LockRepo::acquire`], used by the
    /// mutation services so acquire-and-mutate is atomic relative to other
    /// acquirers.
    pub async fn acquire_on(
        conn: &mut PgConnection,
        table: LockTable,
        row_id: DbId,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<LockInfo, MutationError> {
        let row = Self::select_for_update(conn, table, row_id).await?;
        let Some((is_locked, locked_by, locked_at)) = row else {
            return Err(CoreError::NotFound {
                entity: table.entity_name(),
                id: row_id,
            }
            .into());
        };

        if is_locked {
            if let (Some(holder), Some(acquired_at)) = (locked_by, locked_at) {
                if holder != user_id {
                    if !is_stale(acquired_at, now, timeout_secs) {
                        return Err(CoreError::Locked {
                            holder,
                            locked_at: acquired_at,
                        }
                        .into());
                    }
                    tracing::info!(
                        table = table.table_name(),
                        row_id,
                        prior_holder = holder,
                        "Reclaiming stale lock"
                    );
                }
            }
        }

        let query = format!(
            "UPDATE {} SET is_locked = true, locked_by = $2, locked_at = $3 WHERE id = $1",
            table.table_name()
        );
        sqlx::query(&query)
            .bind(row_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        Ok(LockInfo {
            locked_by: user_id,
            locked_at: now,
        })
    }

    /// Release the lock on a row.
    ///
    /// Succeeds as a no-op if the row is already unlocked. Releasing
    /// another user's non-expired lock fails with `Forbidden`.
    pub async fn release(
        pool: &PgPool,
        table: LockTable,
        row_id: DbId,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<(), MutationError> {
        let mut tx = pool.begin().await?;
        Self::release_on(&mut tx, table, row_id, user_id, now, timeout_secs).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Transaction-composable variant of [`LockRepo::release`].
    pub async fn release_on(
        conn: &mut PgConnection,
        table: LockTable,
        row_id: DbId,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<(), MutationError> {
        let row = Self::select_for_update(conn, table, row_id).await?;
        let Some((is_locked, locked_by, locked_at)) = row else {
            return Err(CoreError::NotFound {
                entity: table.entity_name(),
                id: row_id,
            }
            .into());
        };

        if !is_locked {
            return Ok(());
        }

        if let (Some(holder), Some(acquired_at)) = (locked_by, locked_at) {
            if holder != user_id && !is_stale(acquired_at, now, timeout_secs) {
                return Err(CoreError::Forbidden(format!(
                    "Lock on {} {row_id} is held by user {holder}",
                    table.entity_name()
                ))
                .into());
            }
        }

        Self::clear_on(conn, table, row_id).await
    }

    /// Clear the lock columns without ownership checks. Used on paths that
    /// have already verified ownership within the same transaction.
    pub async fn clear_on(
        conn: &mut PgConnection,
        table: LockTable,
        row_id: DbId,
    ) -> Result<(), MutationError> {
        let query = format!(
            "UPDATE {} SET is_locked = false, locked_by = NULL, locked_at = NULL WHERE id = $1",
            table.table_name()
        );
        sqlx::query(&query).bind(row_id).execute(conn).await?;
        Ok(())
    }

    /// Read-only lock state of a row, as seen by `user_id`.
    pub async fn status(
        pool: &PgPool,
        table: LockTable,
        row_id: DbId,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<LockStatus, MutationError> {
        let query = format!(
            "SELECT is_locked, locked_by, locked_at FROM {} WHERE id = $1",
            table.table_name()
        );
        let row: Option<LockRow> = sqlx::query_as(&query)
            .bind(row_id)
            .fetch_optional(pool)
            .await?;

        let Some((is_locked, locked_by, locked_at)) = row else {
            return Err(CoreError::NotFound {
                entity: table.entity_name(),
                id: row_id,
            }
            .into());
        };

        Ok(match (is_locked, locked_by, locked_at) {
            (true, Some(holder), Some(acquired_at)) => {
                LockStatus::held(holder, acquired_at, user_id, now, timeout_secs)
            }
            _ => LockStatus::unlocked(),
        })
    }

    /// Force-clear every lock held past `timeout_secs`, across all
    /// lock-bearing tables. Returns the number of locks cleared.
    ///
    /// The staleness predicate is part of the UPDATE's WHERE clause, so a
    /// concurrent sweep never clears a lock that was just refreshed.
    pub async fn reap_expired(
        pool: &PgPool,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<u64, MutationError> {
        let cutoff = now - chrono::Duration::seconds(timeout_secs);
        let mut total = 0;

        for table in LockTable::ALL {
            let query = format!(
                "UPDATE {} SET is_locked = false, locked_by = NULL, locked_at = NULL \
                 WHERE is_locked = true AND locked_at < $1",
                table.table_name()
            );
            let result = sqlx::query(&query).bind(cutoff).execute(pool).await?;
            let cleared = result.rows_affected();
            if cleared > 0 {
                tracing::info!(
                    table = table.table_name(),
                    cleared,
                    "Reaped expired locks"
                );
            }
            total += cleared;
        }

        Ok(total)
    }

    async fn select_for_update(
        conn: &mut PgConnection,
        table: LockTable,
        row_id: DbId,
    ) -> Result<Option<LockRow>, sqlx::Error> {
        let query = format!(
            "SELECT is_locked, locked_by, locked_at FROM {} WHERE id = $1 FOR UPDATE",
            table.table_name()
        );
        sqlx::query_as(&query)
            .bind(row_id)
            .fetch_optional(&mut *conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_per_table() {
        assert_eq!(LockTable::Orders.policy(), ConcurrencyPolicy::Pessimistic);
        assert_eq!(
            LockTable::Handovers.policy(),
            ConcurrencyPolicy::Optimistic
        );
    }

    #[test]
    fn test_all_covers_every_table() {
        assert_eq!(LockTable::ALL.len(), 2);
        assert!(LockTable::ALL.contains(&LockTable::Orders));
        assert!(LockTable::ALL.contains(&LockTable::Handovers));
    }
}
