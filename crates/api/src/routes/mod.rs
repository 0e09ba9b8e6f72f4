//! Route table assembly.

pub mod handovers;
pub mod health;
pub mod orders;

use axum::Router;

use crate::state::AppState;

/// All API routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", orders::router())
        .nest("/handovers", handovers::router())
}
