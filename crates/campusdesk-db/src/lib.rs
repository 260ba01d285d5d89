//! # campusdesk DB
//!
//! Database pool initialization and schema migrations for the campusdesk API.
//!
//! Migrations live in the workspace `migrations/` directory and are embedded
//! at compile time. Besides the tables, they install the `btree_gist`
//! exclusion constraints that stop two overlapping sessions from sharing a
//! teacher, class or room even when concurrent requests both pass the
//! application-level conflict check.
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_config::DatabaseConfig;
//! use campusdesk_db::{init_db_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sqlx::Error> {
//!     let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
//!     let pool = init_db_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     Ok(())
//! }
//! ```

use campusdesk_config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Initializes a PostgreSQL connection pool.
///
/// The returned pool is cheaply cloneable and is shared through the
/// application state.
pub async fn init_db_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    info!(max_connections = config.max_connections, "Database pool ready");
    Ok(pool)
}

/// Applies pending migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

// Re-export PgPool for convenience
pub use sqlx::PgPool;
