//! Transaction journal data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Journal entry ID type
pub type EntryId = i64;

/// What a journal entry documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    Deposit,
    Withdrawal,
    BetLock,
    BetUnlock,
    BetPayout,
    BetRefund,
    Commission,
}

impl std::fmt::Display for JournalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalKind::Deposit => write!(f, "deposit"),
            JournalKind::Withdrawal => write!(f, "withdrawal"),
            JournalKind::BetLock => write!(f, "bet_lock"),
            JournalKind::BetUnlock => write!(f, "bet_unlock"),
            JournalKind::BetPayout => write!(f, "bet_payout"),
            JournalKind::BetRefund => write!(f, "bet_refund"),
            JournalKind::Commission => write!(f, "commission"),
        }
    }
}

impl std::str::FromStr for JournalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(JournalKind::Deposit),
            "withdrawal" => Ok(JournalKind::Withdrawal),
            "bet_lock" => Ok(JournalKind::BetLock),
            "bet_unlock" => Ok(JournalKind::BetUnlock),
            "bet_payout" => Ok(JournalKind::BetPayout),
            "bet_refund" => Ok(JournalKind::BetRefund),
            "commission" => Ok(JournalKind::Commission),
            other => Err(format!("unknown journal kind: {other}")),
        }
    }
}

/// Lifecycle of a journal entry
///
/// Entries documenting completed ledger mutations are born `Confirmed`.
/// Deposit/withdrawal entries tied to an external provider start `Pending`
/// and transition exactly once. A `Confirmed` entry is immutable;
/// corrections are new entries, never edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    Pending,
    Confirmed,
    Failed,
    Refunded,
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalStatus::Pending => write!(f, "pending"),
            JournalStatus::Confirmed => write!(f, "confirmed"),
            JournalStatus::Failed => write!(f, "failed"),
            JournalStatus::Refunded => write!(f, "refunded"),
        }
    }
}

impl std::str::FromStr for JournalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JournalStatus::Pending),
            "confirmed" => Ok(JournalStatus::Confirmed),
            "failed" => Ok(JournalStatus::Failed),
            "refunded" => Ok(JournalStatus::Refunded),
            other => Err(format!("unknown journal status: {other}")),
        }
    }
}

/// Journal entry model (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub user_id: i64,
    pub bet_id: Option<i64>,
    pub kind: JournalKind,
    /// Signed delta applied to the spendable balance; negative when funds
    /// leave it (locks, debits), positive when they return or arrive
    pub amount: i64,
    pub balance_after: i64,
    pub status: JournalStatus,
    pub provider: Option<String>,
    pub external_ref: Option<String>,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new journal entry
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub user_id: i64,
    pub bet_id: Option<i64>,
    pub kind: JournalKind,
    pub amount: i64,
    pub balance_after: i64,
    pub status: JournalStatus,
    pub provider: Option<String>,
    pub external_ref: Option<String>,
    pub idempotency_key: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_round_trips() {
        for kind in [
            JournalKind::Deposit,
            JournalKind::Withdrawal,
            JournalKind::BetLock,
            JournalKind::BetUnlock,
            JournalKind::BetPayout,
            JournalKind::BetRefund,
            JournalKind::Commission,
        ] {
            assert_eq!(JournalKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn test_status_round_trips() {
        for status in [
            JournalStatus::Pending,
            JournalStatus::Confirmed,
            JournalStatus::Failed,
            JournalStatus::Refunded,
        ] {
            assert_eq!(
                JournalStatus::from_str(&status.to_string()).unwrap(),
                status
            );
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(JournalKind::from_str("rake").is_err());
    }
}
