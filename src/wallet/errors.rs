//! Wallet error types.

use thiserror::Error;

use crate::journal::JournalError;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Journal write failed
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Insufficient spendable balance
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(i64),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Locked funds do not cover the operation. This signals a prior
    /// bookkeeping bug, not a user error, and is always worth escalating.
    #[error("Invalid ledger state: {0}")]
    InvalidState(String),

    /// Balance would overflow
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Duplicate transaction (idempotency key already used)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database and internal-state errors are sanitized so SQL details and
    /// ledger internals never reach API responses.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) | WalletError::Journal(_) => {
                "Internal server error".to_string()
            }
            WalletError::InvalidState(_) => "Internal server error".to_string(),
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
