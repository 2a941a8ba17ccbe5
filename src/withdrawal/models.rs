//! Withdrawal request data models.

use crate::wallet::{Amount, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Withdrawal request ID type
pub type RequestId = i64;

/// Withdrawal request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    /// Funds locked, awaiting an admin decision
    Pending,
    /// Debited and paid out through the gateway
    Approved,
    /// Funds returned to the available balance
    Rejected,
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "pending"),
            WithdrawalStatus::Approved => write!(f, "approved"),
            WithdrawalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(format!("unknown withdrawal status: {other}")),
        }
    }
}

/// Withdrawal request model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub amount: Amount,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    /// Gateway reference for the payout, set on approval
    pub transaction_ref: Option<String>,
    /// Admin-supplied reason, set on rejection
    pub reason: Option<String>,
}
