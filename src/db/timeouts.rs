//! Database query timeout helpers
//!
//! Provides timeout wrappers for database operations to prevent indefinite hangs.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for database queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for timeout operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    /// Operation timed out
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for timeout operations
pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Execute a database future with a timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(TimeoutError::Database),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}
