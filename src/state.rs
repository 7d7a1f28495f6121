use std::sync::Arc;

use tracing::warn;

use crate::{
    auth::{
        jwt::TokenService,
        repo::{InMemoryUserStore, PgUserStore, UserStore},
        services::AuthService,
    },
    clock::{Clock, SystemClock},
    config::AppConfig,
    db,
    todos::{
        repo::{InMemoryTodoStore, PgTodoStore, TodoStore},
        services::TodoService,
    },
};

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub auth: AuthService,
    pub todos: TodoService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        if config.uses_memory_store() {
            warn!("DATABASE_URL=memory: data lives only as long as this process");
            return Ok(Self::in_memory(config));
        }

        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgTodoStore::new(pool)),
            Arc::new(SystemClock),
        ))
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTodoStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        todos: Arc<dyn TodoStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(&config.jwt, clock));
        Self {
            config: Arc::new(config),
            tokens,
            auth: AuthService::new(users),
            todos: TodoService::new(todos),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = AppConfig {
            database_url: "memory".into(),
            db_max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 24 * 60,
            },
            host: "127.0.0.1".into(),
            port: 0,
        };
        Self::in_memory(config)
    }
}
