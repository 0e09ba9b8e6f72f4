//! Periodic cleanup of expired row locks.
//!
//! A crashed client or closed browser tab leaves its lock behind; the
//! staleness check already lets other editors reclaim such rows on demand,
//! and this job sweeps them in bulk so lock state does not accumulate.
//! Runs on a fixed interval using `tokio::time::interval`.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use lastmile_db::repositories::LockRepo;

/// Run the expired-lock reaper loop.
///
/// Clears locks older than `timeout_secs` across all lockable tables,
/// every `interval_secs`. Runs until `cancel` is triggered.
pub async fn run(pool: PgPool, timeout_secs: i64, interval_secs: u64, cancel: CancellationToken) {
    tracing::info!(timeout_secs, interval_secs, "Lock reaper started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock reaper stopping");
                break;
            }
            _ = interval.tick() => {
                match LockRepo::reap_expired(&pool, Utc::now(), timeout_secs).await {
                    Ok(cleared) => {
                        if cleared > 0 {
                            tracing::info!(cleared, "Lock reaper: cleared expired locks");
                        } else {
                            tracing::debug!("Lock reaper: nothing to clear");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Lock reaper: sweep failed");
                    }
                }
            }
        }
    }
}
