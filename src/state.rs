use std::sync::Arc;

use campusdesk_config::{CorsConfig, DatabaseConfig, JwtConfig};
use campusdesk_db::{init_db_pool, run_migrations};

use crate::store::CampusStore;
use crate::store::pg::PgStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CampusStore>,
    pub jwt_config: JwtConfig,
    pub cors_config: CorsConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CampusStore>,
        jwt_config: JwtConfig,
        cors_config: CorsConfig,
    ) -> Self {
        Self {
            store,
            jwt_config,
            cors_config,
        }
    }
}

/// Connects to PostgreSQL, applies migrations and reads the rest of the
/// configuration from the environment.
pub async fn init_app_state() -> anyhow::Result<AppState> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_db_pool(&db_config).await?;
    run_migrations(&pool).await?;

    Ok(AppState::new(
        Arc::new(PgStore::new(pool)),
        JwtConfig::from_env(),
        CorsConfig::from_env(),
    ))
}
