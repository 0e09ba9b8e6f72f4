use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;

use lastmile_api::auth::jwt::{generate_access_token, JwtConfig};
use lastmile_api::config::ServerConfig;
use lastmile_api::router::build_app_router;
use lastmile_api::state::AppState;
use lastmile_core::types::DbId;

/// Build a test `ServerConfig` with safe defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        lock_timeout_secs: 300,
        reaper_interval_secs: 600,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
///
/// Uses the same [`build_app_router`] as `main.rs` so integration tests
/// exercise the production middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Mint a Bearer token value for the given user and role.
pub fn bearer(user_id: DbId, role: &str) -> String {
    let token = generate_access_token(user_id, role, &test_config().jwt)
        .expect("token generation should succeed");
    format!("Bearer {token}")
}
