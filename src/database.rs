//! database (db) connection pool.
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub const DEFAULT_URL: &str = "sqlite://directory.db";
pub const DEFAULT_POOL_SIZE: u32 = 10;
const MEMORY_URL: &str = "sqlite::memory:";

/// Shared SQL pool.
#[derive(Clone, Debug)]
pub struct Database {
    pub sqlite: SqlitePool,
}

impl Database {
    /// Init database connections.
    pub async fn new(url: &str, pool: u32) -> Result<Self, sqlx::Error> {
        if url == MEMORY_URL {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let sqlite = SqlitePoolOptions::new()
            .max_connections(pool)
            .connect_with(options)
            .await?;

        tracing::info!(%url, "sqlite connected");

        Ok(Self { sqlite })
    }

    /// Private database living as long as the pool.
    ///
    /// Every connection to `:memory:` opens a distinct database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let sqlite = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(MEMORY_URL)
            .await?;

        tracing::debug!("in-memory sqlite connected");

        Ok(Self { sqlite })
    }

    /// Execute migrations scripts.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.sqlite).await?;
        tracing::info!("migrations applied");
        Ok(())
    }
}
