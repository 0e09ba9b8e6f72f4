//! Route definitions for handover notes.
//!
//! Mounted at `/handovers` by `api_routes()`.

use axum::routing::get;
use axum::Router;

use crate::handlers::handover;
use crate::state::AppState;

/// Handover routes.
///
/// ```text
/// GET    /        -> list_handovers (?is_notice, department, page, page_size)
/// POST   /        -> create_handover
/// GET    /{id}    -> get_handover
/// PATCH  /{id}    -> update_handover
/// DELETE /{id}    -> delete_handover
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handover::list_handovers).post(handover::create_handover),
        )
        .route(
            "/{id}",
            get(handover::get_handover)
                .patch(handover::update_handover)
                .delete(handover::delete_handover),
        )
}
