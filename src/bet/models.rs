//! Bet data models.

use crate::fight::{FightId, FightSide};
use crate::wallet::{Amount, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bet ID type
pub type BetId = i64;

/// Bet lifecycle status
///
/// `Pending → {Accepted, Cancelled, Expired}`, `Accepted → {Settled,
/// Cancelled}`. `Settled`, `Cancelled`, and `Expired` are terminal; rows in
/// those states are never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    /// Created, waiting for an acceptor
    Pending,
    /// Matched; both stakes locked
    Accepted,
    /// Resolved by settlement
    Settled,
    /// Cancelled by the creator or an admin
    Cancelled,
    /// Unaccepted when the fight started
    Expired,
}

impl BetStatus {
    /// Whether the bet can still change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BetStatus::Settled | BetStatus::Cancelled | BetStatus::Expired
        )
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "pending"),
            BetStatus::Accepted => write!(f, "accepted"),
            BetStatus::Settled => write!(f, "settled"),
            BetStatus::Cancelled => write!(f, "cancelled"),
            BetStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for BetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BetStatus::Pending),
            "accepted" => Ok(BetStatus::Accepted),
            "settled" => Ok(BetStatus::Settled),
            "cancelled" => Ok(BetStatus::Cancelled),
            "expired" => Ok(BetStatus::Expired),
            other => Err(format!("unknown bet status: {other}")),
        }
    }
}

/// Bet model
///
/// A bet owns exactly one lock of `amount` on the creator's wallet from
/// creation, and one lock of `amount` on the acceptor's wallet from
/// acceptance. `chosen_side` is the creator's pick; the acceptor implicitly
/// holds the opposite corner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub fight_id: FightId,
    pub creator_id: UserId,
    pub acceptor_id: Option<UserId>,
    pub amount: Amount,
    pub chosen_side: FightSide,
    pub status: BetStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}
