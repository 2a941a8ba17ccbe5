//! Wallet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User ID type
pub type UserId = i64;

/// Monetary amount in the smallest currency unit. Never floating point.
pub type Amount = i64;

/// Wallet model
///
/// `balance` is spendable; `locked_balance` is committed to open bets or
/// pending withdrawal requests. The sum of the two only changes through a
/// ledger primitive and neither column ever goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Amount,
    pub locked_balance: Amount,
    pub total_won: Amount,
    pub total_lost: Amount,
    pub total_withdrawn: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Funds the user owns, locked or not
    pub fn total_held(&self) -> Amount {
        self.balance + self.locked_balance
    }
}

/// Balances after a ledger mutation, as returned by the row update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceAfter {
    pub balance: Amount,
    pub locked_balance: Amount,
}
