use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::jwt::JwtConfig;
use crate::config::Config;
use crate::rate_limit::RateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub jwt: JwtConfig,
    /// Fixed-window limiter over every `/api/v1` route.
    pub api_limiter: Arc<RateLimiter>,
    /// Stricter limiter in front of login and registration.
    pub auth_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let window = std::time::Duration::from_secs(config.rate_limit_window_secs.max(1));
        Self {
            jwt: JwtConfig::new(config.jwt_secret.clone(), config.jwt_expiry_mins),
            api_limiter: Arc::new(RateLimiter::new(config.rate_limit_max, window)),
            auth_limiter: Arc::new(RateLimiter::new(config.auth_rate_limit_max, window)),
            db,
            config,
        }
    }
}
