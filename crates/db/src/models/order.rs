//! Order (shipment) entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use lastmile_core::error::CoreError;
use lastmile_core::status::{OrderKind, OrderStatus};
use lastmile_core::types::{DbId, Timestamp};
use lastmile_core::version::VersionMismatch;

/// A row from the `orders` table.
///
/// `status` and `kind` are stored as their string forms; use
/// [`Order::status`] / [`Order::kind`] for the typed view.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: DbId,
    pub order_no: String,
    pub kind: String,
    pub status: String,
    pub department: String,
    pub warehouse: String,
    pub sla: String,
    pub eta: Timestamp,
    pub create_time: Timestamp,
    pub depart_time: Option<Timestamp>,
    pub complete_time: Option<Timestamp>,
    pub postal_code: String,
    pub address: String,
    pub customer: String,
    pub contact: Option<String>,
    pub driver_name: Option<String>,
    pub driver_contact: Option<String>,
    pub remark: Option<String>,
    pub is_locked: bool,
    pub locked_by: Option<DbId>,
    pub locked_at: Option<Timestamp>,
    pub version: i64,
    pub update_by: Option<DbId>,
    pub update_at: Option<Timestamp>,
}

impl Order {
    pub fn status(&self) -> Result<OrderStatus, CoreError> {
        OrderStatus::from_str(&self.status)
    }

    pub fn kind(&self) -> Result<OrderKind, CoreError> {
        OrderKind::from_str(&self.kind)
    }
}

/// DTO for creating an order.
///
/// Status is not accepted from the client: every order starts in WAITING
/// with version 1 and no lock.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrder {
    #[validate(length(min = 1, max = 255))]
    pub order_no: String,
    pub kind: OrderKind,
    #[validate(length(min = 1, max = 50))]
    pub department: String,
    #[validate(length(min = 1, max = 50))]
    pub warehouse: String,
    #[validate(length(min = 1, max = 10))]
    pub sla: String,
    pub eta: Timestamp,
    #[validate(length(equal = 5))]
    pub postal_code: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1, max = 150))]
    pub customer: String,
    #[validate(length(max = 20))]
    pub contact: Option<String>,
    pub remark: Option<String>,
}

/// DTO for updating an order. Only provided fields are applied; the status
/// change (if any) goes through the transition engine.
///
/// `expected_version` enables the advisory optimistic check on top of the
/// pessimistic lock: a mismatch never blocks the write, it is reported back
/// as a warning.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrder {
    pub status: Option<OrderStatus>,
    #[validate(length(min = 1, max = 50))]
    pub department: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub warehouse: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub sla: Option<String>,
    pub eta: Option<Timestamp>,
    #[validate(length(equal = 5))]
    pub postal_code: Option<String>,
    pub address: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub customer: Option<String>,
    #[validate(length(max = 20))]
    pub contact: Option<String>,
    #[validate(length(max = 153))]
    pub driver_name: Option<String>,
    #[validate(length(max = 50))]
    pub driver_contact: Option<String>,
    pub remark: Option<String>,
    pub expected_version: Option<i64>,
}

/// Result of a committed order mutation, with the optional advisory
/// version-conflict warning.
#[derive(Debug, Serialize)]
pub struct UpdatedOrder {
    pub order: Order,
    pub version_warning: Option<VersionMismatch>,
}

/// Per-row outcome of a batch operation. Batches are never all-or-nothing:
/// each row succeeds or fails independently.
#[derive(Debug, Serialize)]
pub struct PerRowResult {
    pub id: DbId,
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
}

impl PerRowResult {
    pub fn ok(id: DbId, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: true,
            message: message.into(),
            old_status: None,
            new_status: None,
        }
    }

    pub fn failed(id: DbId, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            message: message.into(),
            old_status: None,
            new_status: None,
        }
    }
}

/// Date-range + pagination filter for order listing.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    /// Inclusive lower bound on `eta`.
    pub eta_from: Option<Timestamp>,
    /// Inclusive upper bound on `eta`.
    pub eta_to: Option<Timestamp>,
    /// Exact match on the business order number.
    pub order_no: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
