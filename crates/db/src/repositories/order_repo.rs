//! Repository for the `orders` table, including the mutation service that
//! orchestrates lock acquisition, status transitions, version increments,
//! and lock release as one transaction per record.

use sqlx::PgPool;

use lastmile_core::error::CoreError;
use lastmile_core::roles::Role;
use lastmile_core::status::{plan_transition, OrderStatus};
use lastmile_core::types::{DbId, Timestamp};
use lastmile_core::version;

use crate::error::MutationError;
use crate::models::order::{
    CreateOrder, Order, OrderListQuery, PerRowResult, UpdateOrder, UpdatedOrder,
};
use crate::repositories::lock_repo::{LockRepo, LockTable};

/// Column list for `orders` queries.
const COLUMNS: &str = "\
    id, order_no, kind, status, department, warehouse, sla, eta, \
    create_time, depart_time, complete_time, postal_code, address, \
    customer, contact, driver_name, driver_contact, remark, \
    is_locked, locked_by, locked_at, version, update_by, update_at";

/// Maximum page size for order listing.
const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for order listing.
const DEFAULT_PAGE_SIZE: i64 = 30;

/// Provides CRUD and concurrency-controlled mutations for orders.
pub struct OrderRepo;

impl OrderRepo {
    /// Insert a new order. Status is forced to WAITING, version starts at 1,
    /// and the lock columns are unset regardless of input.
    pub async fn create(
        pool: &PgPool,
        input: &CreateOrder,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<Order, MutationError> {
        let query = format!(
            "INSERT INTO orders
                (order_no, kind, status, department, warehouse, sla, eta,
                 create_time, postal_code, address, customer, contact, remark,
                 update_by, update_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {COLUMNS}"
        );
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(&input.order_no)
            .bind(input.kind.as_str())
            .bind(OrderStatus::Waiting.as_str())
            .bind(&input.department)
            .bind(&input.warehouse)
            .bind(&input.sla)
            .bind(input.eta)
            .bind(now)
            .bind(&input.postal_code)
            .bind(&input.address)
            .bind(&input.customer)
            .bind(&input.contact)
            .bind(&input.remark)
            .bind(user_id)
            .bind(now)
            .fetch_one(pool)
            .await?;
        tracing::info!(order_id = order.id, order_no = %order.order_no, "Order created");
        Ok(order)
    }

    /// Find an order by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Order>, MutationError> {
        let query = format!("SELECT {COLUMNS} FROM orders WHERE id = $1");
        Ok(sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?)
    }

    /// List orders filtered by an inclusive `eta` range and optionally an
    /// exact order number, newest eta first, paginated. Returns the page
    /// and the total row count for the filter.
    pub async fn list(
        pool: &PgPool,
        filter: &OrderListQuery,
    ) -> Result<(Vec<Order>, i64), MutationError> {
        let page = filter.page.unwrap_or(1).max(1);
        let page_size = filter
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let query = format!(
            "SELECT {COLUMNS} FROM orders
             WHERE ($1::timestamptz IS NULL OR eta >= $1)
               AND ($2::timestamptz IS NULL OR eta <= $2)
               AND ($3::text IS NULL OR order_no = $3)
             ORDER BY eta DESC
             LIMIT $4 OFFSET $5"
        );
        let orders = sqlx::query_as::<_, Order>(&query)
            .bind(filter.eta_from)
            .bind(filter.eta_to)
            .bind(&filter.order_no)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(pool)
            .await?;

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders
             WHERE ($1::timestamptz IS NULL OR eta >= $1)
               AND ($2::timestamptz IS NULL OR eta <= $2)
               AND ($3::text IS NULL OR order_no = $3)",
        )
        .bind(filter.eta_from)
        .bind(filter.eta_to)
        .bind(&filter.order_no)
        .fetch_one(pool)
        .await?;

        Ok((orders, total.0))
    }

    /// Apply a full record update as one atomic unit.
    ///
    /// Acquires the row lock, loads the row, runs the advisory version
    /// check, plans any status transition, applies the field changes,
    /// increments the version, stamps the content audit fields, releases
    /// the lock, and commits. Any failure rolls the whole transaction back,
    /// so partial field application is never observable.
    pub async fn update_record(
        pool: &PgPool,
        id: DbId,
        changes: &UpdateOrder,
        user_id: DbId,
        role: Role,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<UpdatedOrder, MutationError> {
        let mut tx = pool.begin().await?;

        LockRepo::acquire_on(&mut tx, LockTable::Orders, id, user_id, now, timeout_secs).await?;

        let query = format!("SELECT {COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        // Rolling back also reverts the acquisition, so the lock never
        // outlives a failed update.
        let Some(order) = order else {
            return Err(CoreError::NotFound {
                entity: "order",
                id,
            }
            .into());
        };

        let version_warning = version::check(
            changes.expected_version,
            order.version,
            order.update_by,
            order.update_at,
        );

        let (status, depart_time, complete_time) = match changes.status {
            Some(target) => {
                let plan = plan_transition(
                    order.status()?,
                    target,
                    role,
                    order.depart_time,
                    order.complete_time,
                    now,
                )?;
                (plan.status.as_str(), plan.depart_time, plan.complete_time)
            }
            None => (
                order.status()?.as_str(),
                order.depart_time,
                order.complete_time,
            ),
        };

        let query = format!(
            "UPDATE orders SET
                status = $2,
                depart_time = $3,
                complete_time = $4,
                department = COALESCE($5, department),
                warehouse = COALESCE($6, warehouse),
                sla = COALESCE($7, sla),
                eta = COALESCE($8, eta),
                postal_code = COALESCE($9, postal_code),
                address = COALESCE($10, address),
                customer = COALESCE($11, customer),
                contact = COALESCE($12, contact),
                driver_name = COALESCE($13, driver_name),
                driver_contact = COALESCE($14, driver_contact),
                remark = COALESCE($15, remark),
                version = version + 1,
                update_by = $16,
                update_at = $17,
                is_locked = false,
                locked_by = NULL,
                locked_at = NULL
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(status)
            .bind(depart_time)
            .bind(complete_time)
            .bind(&changes.department)
            .bind(&changes.warehouse)
            .bind(&changes.sla)
            .bind(changes.eta)
            .bind(&changes.postal_code)
            .bind(&changes.address)
            .bind(&changes.customer)
            .bind(&changes.contact)
            .bind(&changes.driver_name)
            .bind(&changes.driver_contact)
            .bind(&changes.remark)
            .bind(user_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = id,
            user_id,
            version = updated.version,
            mismatch = version_warning.is_some(),
            "Order updated"
        );

        Ok(UpdatedOrder {
            order: updated,
            version_warning,
        })
    }

    /// Change the status of a batch of orders.
    ///
    /// Each id runs in its own transaction and succeeds or fails
    /// independently; partial success is expected and reported per row.
    pub async fn change_status(
        pool: &PgPool,
        ids: &[DbId],
        new_status: OrderStatus,
        user_id: DbId,
        role: Role,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Vec<PerRowResult> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let result =
                Self::change_status_one(pool, id, new_status, user_id, role, now, timeout_secs)
                    .await
                    .unwrap_or_else(|err| row_failure(id, &err));
            results.push(result);
        }
        results
    }

    async fn change_status_one(
        pool: &PgPool,
        id: DbId,
        new_status: OrderStatus,
        user_id: DbId,
        role: Role,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<PerRowResult, MutationError> {
        let mut tx = pool.begin().await?;

        LockRepo::acquire_on(&mut tx, LockTable::Orders, id, user_id, now, timeout_secs).await?;

        let query = format!("SELECT {COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(order) = order else {
            return Err(CoreError::NotFound {
                entity: "order",
                id,
            }
            .into());
        };

        let old_status = order.status()?;
        let plan = plan_transition(
            old_status,
            new_status,
            role,
            order.depart_time,
            order.complete_time,
            now,
        )?;

        if !plan.changed {
            // No-op: roll back so the transient lock acquisition vanishes.
            tx.rollback().await?;
            return Ok(PerRowResult::ok(
                id,
                format!("Already in status {}", new_status.label()),
            ));
        }

        sqlx::query(
            "UPDATE orders SET
                status = $2, depart_time = $3, complete_time = $4,
                version = version + 1, update_by = $5, update_at = $6,
                is_locked = false, locked_by = NULL, locked_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(plan.status.as_str())
        .bind(plan.depart_time)
        .bind(plan.complete_time)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = id,
            user_id,
            from = old_status.as_str(),
            to = plan.status.as_str(),
            "Order status changed"
        );

        Ok(PerRowResult {
            id,
            ok: true,
            message: format!(
                "Status changed: {} -> {}",
                old_status.label(),
                plan.status.label()
            ),
            old_status: Some(old_status.as_str().to_string()),
            new_status: Some(plan.status.as_str().to_string()),
        })
    }

    /// Assign a driver to a batch of orders under the same per-row lock
    /// discipline as status changes.
    pub async fn assign_driver(
        pool: &PgPool,
        ids: &[DbId],
        driver_name: &str,
        driver_contact: Option<&str>,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Vec<PerRowResult> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let result = Self::assign_driver_one(
                pool,
                id,
                driver_name,
                driver_contact,
                user_id,
                now,
                timeout_secs,
            )
            .await
            .unwrap_or_else(|err| row_failure(id, &err));
            results.push(result);
        }
        results
    }

    async fn assign_driver_one(
        pool: &PgPool,
        id: DbId,
        driver_name: &str,
        driver_contact: Option<&str>,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<PerRowResult, MutationError> {
        let mut tx = pool.begin().await?;

        LockRepo::acquire_on(&mut tx, LockTable::Orders, id, user_id, now, timeout_secs).await?;

        let result = sqlx::query(
            "UPDATE orders SET
                driver_name = $2, driver_contact = $3,
                version = version + 1, update_by = $4, update_at = $5,
                is_locked = false, locked_by = NULL, locked_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(driver_name)
        .bind(driver_contact)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                entity: "order",
                id,
            }
            .into());
        }

        tx.commit().await?;
        Ok(PerRowResult::ok(
            id,
            format!("Driver assigned: {driver_name}"),
        ))
    }

    /// Delete a batch of orders. Admin only; each row is lock-checked so a
    /// record someone is actively editing cannot be deleted underneath them.
    pub async fn delete(
        pool: &PgPool,
        ids: &[DbId],
        user_id: DbId,
        role: Role,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<Vec<PerRowResult>, MutationError> {
        if !role.is_admin() {
            return Err(CoreError::Forbidden("Only admins can delete orders".into()).into());
        }

        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let result = Self::delete_one(pool, id, user_id, now, timeout_secs)
                .await
                .unwrap_or_else(|err| row_failure(id, &err));
            results.push(result);
        }
        Ok(results)
    }

    async fn delete_one(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        now: Timestamp,
        timeout_secs: i64,
    ) -> Result<PerRowResult, MutationError> {
        let mut tx = pool.begin().await?;

        LockRepo::acquire_on(&mut tx, LockTable::Orders, id, user_id, now, timeout_secs).await?;

        let row: Option<(String,)> =
            sqlx::query_as("DELETE FROM orders WHERE id = $1 RETURNING order_no")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((order_no,)) = row else {
            return Err(CoreError::NotFound {
                entity: "order",
                id,
            }
            .into());
        };

        tx.commit().await?;
        tracing::info!(order_id = id, user_id, order_no = %order_no, "Order deleted");
        Ok(PerRowResult::ok(id, format!("Order deleted: {order_no}")))
    }
}

/// Map a mutation error to a per-row batch failure.
fn row_failure(id: DbId, err: &MutationError) -> PerRowResult {
    let message = match err {
        MutationError::Domain(core) => core.to_string(),
        MutationError::Database(db) => {
            tracing::error!(order_id = id, error = %db, "Batch row failed on database error");
            "Database error".to_string()
        }
    };
    PerRowResult::failed(id, message)
}
