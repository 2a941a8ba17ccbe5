//! Journal error types.

use super::models::{EntryId, JournalStatus};
use thiserror::Error;

/// Journal errors
#[derive(Debug, Error)]
pub enum JournalError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Idempotency key already used
    #[error("Duplicate journal entry: {0}")]
    DuplicateKey(String),

    /// Status transition lost a race or targeted the wrong state
    #[error("Invalid status transition for entry {entry_id}: expected {expected}, requested {requested}")]
    InvalidTransition {
        entry_id: EntryId,
        expected: JournalStatus,
        requested: JournalStatus,
    },

    /// Stored row failed to parse; manual reconciliation required
    #[error("Corrupt journal entry: {0}")]
    CorruptEntry(String),
}

/// Result type for journal operations
pub type JournalResult<T> = Result<T, JournalError>;
