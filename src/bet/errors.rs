//! Bet lifecycle error types.

use crate::fight::FightError;
use crate::journal::JournalError;
use crate::wallet::WalletError;
use thiserror::Error;

/// Bet errors
#[derive(Debug, Error)]
pub enum BetError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger operation failed
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Journal write failed
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Fight lookup or state check failed
    #[error("Fight error: {0}")]
    Fight(#[from] FightError),

    /// Malformed input, caller's fault
    #[error("Validation error: {0}")]
    Validation(String),

    /// State-machine race lost (double-accept, cancel after accept)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown bet
    #[error("Bet not found: {0}")]
    NotFound(i64),
}

impl BetError {
    /// Client-safe message; database and ledger internals stay out of
    /// responses.
    pub fn client_message(&self) -> String {
        match self {
            BetError::Database(_) | BetError::Journal(_) => "Internal server error".to_string(),
            BetError::Wallet(w) => w.client_message(),
            _ => self.to_string(),
        }
    }
}

/// Result type for bet operations
pub type BetResult<T> = Result<T, BetError>;
