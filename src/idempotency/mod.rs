//! Shared idempotency replay store.
//!
//! State-changing requests carry a client-supplied key; the response of the
//! first successful execution is cached here and replayed for retries within
//! the TTL window. The store is database-backed so the guarantee holds across
//! server instances — an in-process map would silently break it behind a load
//! balancer. The journal's unique idempotency-key column remains the
//! ledger-level backstop when the window has lapsed.

use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use thiserror::Error;

/// Idempotency store errors
#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

/// TTL-expiring key-value store for request replay
#[derive(Clone)]
pub struct IdempotencyStore {
    pool: Arc<PgPool>,
    ttl: Duration,
}

impl IdempotencyStore {
    /// Create a store with the given replay window in hours
    pub fn new(pool: Arc<PgPool>, ttl_hours: i64) -> Self {
        Self {
            pool,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Look up a previously cached response for this key
    ///
    /// Entries older than the TTL count as misses; the sweep deletes them.
    pub async fn check(&self, key: &str) -> IdempotencyResult<Option<serde_json::Value>> {
        let row = sqlx::query(
            "SELECT response, created_at FROM idempotency_keys WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at = row.get::<chrono::NaiveDateTime, _>("created_at").and_utc();
        if Utc::now() - created_at > self.ttl {
            return Ok(None);
        }

        Ok(Some(row.get::<serde_json::Value, _>("response")))
    }

    /// Cache the response of a successful execution
    ///
    /// First writer wins; a concurrent duplicate insert is ignored so the
    /// original response stays authoritative.
    pub async fn store(&self, key: &str, response: &serde_json::Value) -> IdempotencyResult<()> {
        sqlx::query(
            "INSERT INTO idempotency_keys (key, response) VALUES ($1, $2)
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(response)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Delete entries older than the TTL; returns how many were removed
    pub async fn sweep_expired(&self) -> IdempotencyResult<u64> {
        let cutoff = (Utc::now() - self.ttl).naive_utc();
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE created_at < $1")
            .bind(cutoff)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
