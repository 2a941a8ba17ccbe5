//! Fight data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fight ID type
pub type FightId = i64;

/// Fight status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FightStatus {
    /// Announced, accepting wagers
    Scheduled,
    /// In progress, no new wagers
    Ongoing,
    /// Result validated, wagers settled
    Completed,
    /// Called off
    Cancelled,
}

impl std::fmt::Display for FightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FightStatus::Scheduled => write!(f, "scheduled"),
            FightStatus::Ongoing => write!(f, "ongoing"),
            FightStatus::Completed => write!(f, "completed"),
            FightStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for FightStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(FightStatus::Scheduled),
            "ongoing" => Ok(FightStatus::Ongoing),
            "completed" => Ok(FightStatus::Completed),
            "cancelled" => Ok(FightStatus::Cancelled),
            other => Err(format!("unknown fight status: {other}")),
        }
    }
}

/// Corner a wager is placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FightSide {
    A,
    B,
}

impl std::fmt::Display for FightSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FightSide::A => write!(f, "a"),
            FightSide::B => write!(f, "b"),
        }
    }
}

impl std::str::FromStr for FightSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(FightSide::A),
            "b" => Ok(FightSide::B),
            other => Err(format!("unknown fight side: {other}")),
        }
    }
}

/// Validated result of a fight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FightWinner {
    A,
    B,
    Draw,
}

impl FightWinner {
    /// Whether a wager on `side` won under this result
    pub fn favors(&self, side: FightSide) -> bool {
        matches!(
            (self, side),
            (FightWinner::A, FightSide::A) | (FightWinner::B, FightSide::B)
        )
    }
}

impl std::fmt::Display for FightWinner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FightWinner::A => write!(f, "a"),
            FightWinner::B => write!(f, "b"),
            FightWinner::Draw => write!(f, "draw"),
        }
    }
}

impl std::str::FromStr for FightWinner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(FightWinner::A),
            "b" => Ok(FightWinner::B),
            "draw" => Ok(FightWinner::Draw),
            other => Err(format!("unknown fight winner: {other}")),
        }
    }
}

/// Fight model
///
/// Read-only to the bet lifecycle; only the settlement orchestrator moves a
/// fight to `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fight {
    pub id: FightId,
    pub status: FightStatus,
    pub winner: Option<FightWinner>,
    pub starts_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Fight {
    /// Whether the fight still accepts new wagers at `now`
    pub fn open_for_bets(&self, now: DateTime<Utc>) -> bool {
        self.status == FightStatus::Scheduled && self.starts_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_winner_favors_matching_side() {
        assert!(FightWinner::A.favors(FightSide::A));
        assert!(FightWinner::B.favors(FightSide::B));
        assert!(!FightWinner::A.favors(FightSide::B));
        assert!(!FightWinner::Draw.favors(FightSide::A));
        assert!(!FightWinner::Draw.favors(FightSide::B));
    }

    #[test]
    fn test_open_for_bets_requires_scheduled_future() {
        let now = Utc::now();
        let fight = Fight {
            id: 1,
            status: FightStatus::Scheduled,
            winner: None,
            starts_at: now + Duration::hours(1),
            created_at: now,
        };
        assert!(fight.open_for_bets(now));

        let started = Fight {
            starts_at: now - Duration::minutes(1),
            ..fight.clone()
        };
        assert!(!started.open_for_bets(now));

        let ongoing = Fight {
            status: FightStatus::Ongoing,
            ..fight
        };
        assert!(!ongoing.open_for_bets(now));
    }
}
