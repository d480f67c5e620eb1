//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::JwtManager;
use crate::config::Config;
use crate::realtime::ChannelRegistry;

/// State shared across all request handlers and WebSocket sessions
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: JwtManager,

    /// Live-session registry, one instance for the whole process
    pub registry: Arc<ChannelRegistry>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            registry: Arc::new(ChannelRegistry::new()),
        }
    }
}
