//! Route definitions for the order board.
//!
//! Mounted at `/orders` by `api_routes()`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::order;
use crate::state::AppState;

/// Order routes.
///
/// ```text
/// GET    /                -> list_orders (?eta_from, eta_to, page, page_size)
/// POST   /                -> create_order
/// DELETE /                -> delete_orders (batch, admin only)
/// POST   /status          -> change_status (batch)
/// POST   /driver          -> assign_driver (batch)
/// GET    /{id}            -> get_order
/// PATCH  /{id}            -> update_order
/// POST   /{id}/lock       -> acquire_lock
/// DELETE /{id}/lock       -> release_lock
/// GET    /{id}/lock       -> lock_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(order::list_orders)
                .post(order::create_order)
                .delete(order::delete_orders),
        )
        .route("/status", post(order::change_status))
        .route("/driver", post(order::assign_driver))
        .route(
            "/{id}",
            get(order::get_order).patch(order::update_order),
        )
        .route(
            "/{id}/lock",
            post(order::acquire_lock)
                .delete(order::release_lock)
                .get(order::lock_status),
        )
}
