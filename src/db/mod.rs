//! Database module providing PostgreSQL connection pooling and utilities.
//!
//! Every balance-affecting operation in the crate runs inside an sqlx
//! transaction obtained from this pool; the transaction commit is the only
//! correctness boundary shared between server instances.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use timeouts::with_timeout;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Arguments
    ///
    /// * `config` - Database configuration
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fightbook::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database connection is healthy
    ///
    /// Bounded by [`timeouts::DEFAULT_QUERY_TIMEOUT`] so a wedged pool shows
    /// up as unhealthy instead of hanging the caller.
    pub async fn health_check(&self) -> timeouts::TimeoutResult<()> {
        with_timeout(timeouts::DEFAULT_QUERY_TIMEOUT, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
