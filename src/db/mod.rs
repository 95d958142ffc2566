pub mod memory;
pub mod repository;

use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::config::AppConfig;

pub use memory::InMemoryDutyRepository;
pub use repository::{DutyRepository, SqliteDutyRepository, UnitOfWork};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn connect(config: &AppConfig) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.pool_max)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&config.database_url)
        .await?;

    MIGRATOR.run(&pool).await?;
    info!("database ready ({} max connections)", config.pool_max);

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
/// Every pooled connection to `:memory:` is its own database, so the pool
/// is pinned to one connection that never expires.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(2))
        .connect("sqlite::memory:")
        .await?;

    MIGRATOR.run(&pool).await?;

    Ok(pool)
}
