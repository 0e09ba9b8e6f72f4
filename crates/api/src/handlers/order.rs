//! Handlers for the order board: CRUD, batch status changes, driver
//! assignment, and the explicit row-lock endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use validator::Validate;

use lastmile_core::error::CoreError;
use lastmile_core::status::OrderStatus;
use lastmile_core::types::DbId;
use lastmile_db::models::order::{CreateOrder, Order, OrderListQuery, UpdateOrder};
use lastmile_db::repositories::{LockRepo, LockTable, OrderRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response payloads
// ---------------------------------------------------------------------------

/// Request body for the batch status-change endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct ChangeStatusRequest {
    pub ids: Vec<DbId>,
    pub status: OrderStatus,
}

/// Request body for the batch driver-assignment endpoint.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct AssignDriverRequest {
    pub ids: Vec<DbId>,
    #[validate(length(min = 1, max = 153))]
    pub driver_name: String,
    #[validate(length(max = 50))]
    pub driver_contact: Option<String>,
}

/// Request body for the batch delete endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct DeleteOrdersRequest {
    pub ids: Vec<DbId>,
}

/// Paginated order list payload.
#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub items: Vec<Order>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// CRUD handlers
// ---------------------------------------------------------------------------

/// GET /orders?eta_from=&eta_to=&page=&page_size=
///
/// List orders filtered by an inclusive eta range.
pub async fn list_orders(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<OrderListQuery>,
) -> AppResult<impl IntoResponse> {
    let (items, total) = OrderRepo::list(&state.pool, &filter).await?;
    Ok(Json(DataResponse {
        data: OrderListResponse { items, total },
    }))
}

/// POST /orders
///
/// Create a new order. Status always starts at WAITING.
pub async fn create_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateOrder>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let order = OrderRepo::create(&state.pool, &input, auth.user_id, Utc::now()).await?;

    tracing::info!(
        user_id = auth.user_id,
        order_id = order.id,
        order_no = %order.order_no,
        "Order created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: order })))
}

/// GET /orders/{id}
pub async fn get_order(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let order = OrderRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "order",
            id,
        }))?;

    Ok(Json(DataResponse { data: order }))
}

/// PATCH /orders/{id}
///
/// Apply a record update as one atomic unit: lock, optional status
/// transition, field changes, version bump, unlock. A stale
/// `expected_version` does not block the write; the mismatch is returned
/// alongside the updated record as `version_warning`.
pub async fn update_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(changes): Json<UpdateOrder>,
) -> AppResult<impl IntoResponse> {
    changes
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let updated = OrderRepo::update_record(
        &state.pool,
        id,
        &changes,
        auth.user_id,
        auth.role,
        Utc::now(),
        state.config.lock_timeout_secs,
    )
    .await?;

    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// Batch handlers
// ---------------------------------------------------------------------------

/// POST /orders/status
///
/// Change the status of a batch of orders. Rows succeed or fail
/// independently; the response reports a result per id.
pub async fn change_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ChangeStatusRequest>,
) -> AppResult<impl IntoResponse> {
    if req.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }

    let results = OrderRepo::change_status(
        &state.pool,
        &req.ids,
        req.status,
        auth.user_id,
        auth.role,
        Utc::now(),
        state.config.lock_timeout_secs,
    )
    .await;

    Ok(Json(DataResponse { data: results }))
}

/// POST /orders/driver
///
/// Assign a driver to a batch of orders.
pub async fn assign_driver(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AssignDriverRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if req.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }

    let results = OrderRepo::assign_driver(
        &state.pool,
        &req.ids,
        &req.driver_name,
        req.driver_contact.as_deref(),
        auth.user_id,
        Utc::now(),
        state.config.lock_timeout_secs,
    )
    .await;

    Ok(Json(DataResponse { data: results }))
}

/// DELETE /orders
///
/// Delete a batch of orders. Admin only; rows locked by another editor
/// fail individually.
pub async fn delete_orders(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DeleteOrdersRequest>,
) -> AppResult<impl IntoResponse> {
    if req.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }

    let results = OrderRepo::delete(
        &state.pool,
        &req.ids,
        auth.user_id,
        auth.role,
        Utc::now(),
        state.config.lock_timeout_secs,
    )
    .await?;

    Ok(Json(DataResponse { data: results }))
}

// ---------------------------------------------------------------------------
// Lock handlers
// ---------------------------------------------------------------------------

/// POST /orders/{id}/lock
///
/// Acquire (or refresh) the edit lock on an order.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let info = LockRepo::acquire(
        &state.pool,
        LockTable::Orders,
        id,
        auth.user_id,
        Utc::now(),
        state.config.lock_timeout_secs,
    )
    .await?;

    Ok(Json(DataResponse { data: info }))
}

/// DELETE /orders/{id}/lock
///
/// Release the edit lock on an order. Releasing an unlocked row is a no-op.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    LockRepo::release(
        &state.pool,
        LockTable::Orders,
        id,
        auth.user_id,
        Utc::now(),
        state.config.lock_timeout_secs,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /orders/{id}/lock
///
/// Report the lock state of an order as seen by the caller.
pub async fn lock_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let status = LockRepo::status(
        &state.pool,
        LockTable::Orders,
        id,
        auth.user_id,
        Utc::now(),
        state.config.lock_timeout_secs,
    )
    .await?;

    Ok(Json(DataResponse { data: status }))
}
