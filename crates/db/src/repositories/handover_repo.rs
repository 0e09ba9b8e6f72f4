//! Repository for the `handovers` table.
//!
//! Handovers use the optimistic concurrency policy: updates are never
//! blocked by a lock, the per-row version counter detects concurrent
//! edits, and a mismatch rides the success response as a warning.

use sqlx::PgPool;

use lastmile_core::error::CoreError;
use lastmile_core::roles::Role;
use lastmile_core::types::{DbId, Timestamp};
use lastmile_core::version;

use crate::error::MutationError;
use crate::models::handover::{
    CreateHandover, Handover, HandoverListQuery, UpdateHandover, UpdatedHandover,
};

/// Column list for `handovers` queries.
const COLUMNS: &str = "\
    id, title, content, is_notice, department, status, create_by, \
    create_time, is_locked, locked_by, locked_at, version, update_by, update_at";

/// Maximum page size for handover listing.
const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for handover listing.
const DEFAULT_PAGE_SIZE: i64 = 30;

/// Provides CRUD and version-guarded mutations for handover notes.
pub struct HandoverRepo;

impl HandoverRepo {
    /// Insert a new handover note. Version starts at 1.
    pub async fn create(
        pool: &PgPool,
        input: &CreateHandover,
        user_id: DbId,
        role: Role,
        now: Timestamp,
    ) -> Result<Handover, MutationError> {
        if input.is_notice && !role.is_admin() {
            return Err(
                CoreError::Forbidden("Only admins can post notices".into()).into(),
            );
        }

        let query = format!(
            "INSERT INTO handovers
                (title, content, is_notice, department, create_by, create_time,
                 update_by, update_at)
             VALUES ($1, $2, $3, $4, $5, $6, $5, $6)
             RETURNING {COLUMNS}"
        );
        let handover = sqlx::query_as::<_, Handover>(&query)
            .bind(&input.title)
            .bind(&input.content)
            .bind(input.is_notice)
            .bind(&input.department)
            .bind(user_id)
            .bind(now)
            .fetch_one(pool)
            .await?;
        tracing::info!(handover_id = handover.id, user_id, "Handover created");
        Ok(handover)
    }

    /// Find a handover by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Handover>, MutationError> {
        let query = format!("SELECT {COLUMNS} FROM handovers WHERE id = $1");
        Ok(sqlx::query_as::<_, Handover>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    /// List handovers, newest update first, optionally filtered by notice
    /// flag and department.
    pub async fn list(
        pool: &PgPool,
        filter: &HandoverListQuery,
    ) -> Result<(Vec<Handover>, i64), MutationError> {
        let page = filter.page.unwrap_or(1).max(1);
        let page_size = filter
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let query = format!(
            "SELECT {COLUMNS} FROM handovers
             WHERE ($1::boolean IS NULL OR is_notice = $1)
               AND ($2::text IS NULL OR department = $2)
             ORDER BY update_at DESC NULLS LAST, id DESC
             LIMIT $3 OFFSET $4"
        );
        let handovers = sqlx::query_as::<_, Handover>(&query)
            .bind(filter.is_notice)
            .bind(&filter.department)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(pool)
            .await?;

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM handovers
             WHERE ($1::boolean IS NULL OR is_notice = $1)
               AND ($2::text IS NULL OR department = $2)",
        )
        .bind(filter.is_notice)
        .bind(&filter.department)
        .fetch_one(pool)
        .await?;

        Ok((handovers, total.0))
    }

    /// Apply a handover update under the optimistic policy.
    ///
    /// Author-or-admin may edit; only admins may flip the notice flag.
    /// The submitted `expected_version` is compared against the stored
    /// version: a mismatch does not block the write, it is returned as a
    /// warning naming the prior editor. The version increments by exactly
    /// one per committed mutation.
    pub async fn update_record(
        pool: &PgPool,
        id: DbId,
        changes: &UpdateHandover,
        user_id: DbId,
        role: Role,
        now: Timestamp,
    ) -> Result<UpdatedHandover, MutationError> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM handovers WHERE id = $1 FOR UPDATE");
        let handover = sqlx::query_as::<_, Handover>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(handover) = handover else {
            return Err(CoreError::NotFound {
                entity: "handover",
                id,
            }
            .into());
        };

        if handover.create_by != user_id && !role.is_admin() {
            return Err(CoreError::Forbidden(
                "Only the author or an admin can edit this handover".into(),
            )
            .into());
        }
        if let Some(is_notice) = changes.is_notice {
            if is_notice != handover.is_notice && !role.is_admin() {
                return Err(CoreError::Forbidden(
                    "Only admins can change the notice flag".into(),
                )
                .into());
            }
        }

        let version_warning = version::check(
            changes.expected_version,
            handover.version,
            handover.update_by,
            handover.update_at,
        );

        let query = format!(
            "UPDATE handovers SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                is_notice = COALESCE($4, is_notice),
                status = COALESCE($5, status),
                department = COALESCE($6, department),
                version = version + 1,
                update_by = $7,
                update_at = $8
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Handover>(&query)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.content)
            .bind(changes.is_notice)
            .bind(changes.status.map(|s| s.as_str()))
            .bind(&changes.department)
            .bind(user_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            handover_id = id,
            user_id,
            version = updated.version,
            mismatch = version_warning.is_some(),
            "Handover updated"
        );

        Ok(UpdatedHandover {
            handover: updated,
            version_warning,
        })
    }

    /// Delete a handover. Author-or-admin only.
    pub async fn delete(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        role: Role,
    ) -> Result<(), MutationError> {
        let mut tx = pool.begin().await?;

        let row: Option<(DbId,)> =
            sqlx::query_as("SELECT create_by FROM handovers WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((create_by,)) = row else {
            return Err(CoreError::NotFound {
                entity: "handover",
                id,
            }
            .into());
        };

        if create_by != user_id && !role.is_admin() {
            return Err(CoreError::Forbidden(
                "Only the author or an admin can delete this handover".into(),
            )
            .into());
        }

        sqlx::query("DELETE FROM handovers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(handover_id = id, user_id, "Handover deleted");
        Ok(())
    }
}
