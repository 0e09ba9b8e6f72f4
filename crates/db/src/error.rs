//! Error type for repository operations.

use lastmile_core::error::CoreError;

/// A repository operation failed either on a business rule or in the
/// database itself. Domain errors carry their own taxonomy (`NotFound`,
/// `Locked`, `InvalidTransition`, ...); database errors roll the enclosing
/// transaction back in full, so partial writes are never observable.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
