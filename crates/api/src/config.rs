use lastmile_core::locking::{LOCK_TIMEOUT_SECS, REAPER_INTERVAL_SECS};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Row-lock staleness timeout in seconds (default: `300`).
    pub lock_timeout_secs: i64,
    /// How often the expired-lock reaper runs, in seconds (default: `600`).
    pub reaper_interval_secs: u64,
    /// JWT token configuration (secret, expiry duration).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                    |
    /// |-----------------------------|----------------------------|
    /// | `HOST`                      | `0.0.0.0`                  |
    /// | `PORT`                      | `3000`                     |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                       |
    /// | `LOCK_TIMEOUT_SECS`         | `300`                      |
    /// | `LOCK_REAPER_INTERVAL_SECS` | `600`                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let lock_timeout_secs: i64 = std::env::var("LOCK_TIMEOUT_SECS")
            .unwrap_or_else(|_| LOCK_TIMEOUT_SECS.to_string())
            .parse()
            .expect("LOCK_TIMEOUT_SECS must be a valid i64");

        let reaper_interval_secs: u64 = std::env::var("LOCK_REAPER_INTERVAL_SECS")
            .unwrap_or_else(|_| REAPER_INTERVAL_SECS.to_string())
            .parse()
            .expect("LOCK_REAPER_INTERVAL_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            lock_timeout_secs,
            reaper_interval_secs,
            jwt,
        }
    }
}
