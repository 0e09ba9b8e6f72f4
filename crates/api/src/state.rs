use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// Server configuration loaded at startup.
    pub config: Arc<ServerConfig>,
}
