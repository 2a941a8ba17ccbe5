//! Pure payout computation for a matched bet.
//!
//! Kept free of database concerns so the money math is testable exhaustively.
//! Conservation holds by construction: across both parties of a bet, funds
//! before settlement equal funds after plus the commission deducted.

use crate::bet::BetId;
use crate::fight::{FightSide, FightWinner};
use crate::wallet::{Amount, UserId};

/// A fully matched bet as the orchestrator sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedBet {
    pub bet_id: BetId,
    pub creator_id: UserId,
    pub acceptor_id: UserId,
    /// Stake locked on each side
    pub amount: Amount,
    /// The creator's corner; the acceptor holds the other one
    pub chosen_side: FightSide,
}

/// What settlement does with one matched bet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BetOutcome {
    /// Both parties get their own stake back; no commission
    Draw { refund: Amount },
    /// The loser's stake moves to the winner, minus commission
    Decided {
        winner_id: UserId,
        loser_id: UserId,
        stake: Amount,
        commission: Amount,
    },
}

impl BetOutcome {
    /// Compute the outcome of a matched bet under a validated result
    pub fn compute(bet: &MatchedBet, winner: FightWinner, commission_rate_bps: i64) -> Self {
        if winner == FightWinner::Draw {
            return BetOutcome::Draw { refund: bet.amount };
        }

        let creator_won = winner.favors(bet.chosen_side);
        let (winner_id, loser_id) = if creator_won {
            (bet.creator_id, bet.acceptor_id)
        } else {
            (bet.acceptor_id, bet.creator_id)
        };

        BetOutcome::Decided {
            winner_id,
            loser_id,
            stake: bet.amount,
            commission: commission_for(bet.amount, commission_rate_bps),
        }
    }

    /// Net change across both parties' holdings; always `-commission`
    pub fn conservation_delta(&self) -> Amount {
        match self {
            BetOutcome::Draw { .. } => 0,
            BetOutcome::Decided { commission, .. } => -commission,
        }
    }
}

/// Commission on a winning stake, in the smallest currency unit
///
/// Computed in i128 so the intermediate product cannot overflow, floored
/// toward zero so the platform never rounds in its own favor.
pub fn commission_for(stake: Amount, rate_bps: i64) -> Amount {
    ((stake as i128 * rate_bps as i128) / 10_000) as Amount
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(amount: Amount, side: FightSide) -> MatchedBet {
        MatchedBet {
            bet_id: 1,
            creator_id: 10,
            acceptor_id: 20,
            amount,
            chosen_side: side,
        }
    }

    #[test]
    fn test_creator_wins_when_side_matches() {
        let outcome = BetOutcome::compute(&matched(3_000, FightSide::A), FightWinner::A, 1000);
        assert_eq!(
            outcome,
            BetOutcome::Decided {
                winner_id: 10,
                loser_id: 20,
                stake: 3_000,
                commission: 300,
            }
        );
    }

    #[test]
    fn test_acceptor_wins_opposite_side() {
        let outcome = BetOutcome::compute(&matched(3_000, FightSide::A), FightWinner::B, 1000);
        assert_eq!(
            outcome,
            BetOutcome::Decided {
                winner_id: 20,
                loser_id: 10,
                stake: 3_000,
                commission: 300,
            }
        );
    }

    #[test]
    fn test_draw_refunds_without_commission() {
        let outcome = BetOutcome::compute(&matched(3_000, FightSide::B), FightWinner::Draw, 1000);
        assert_eq!(outcome, BetOutcome::Draw { refund: 3_000 });
        assert_eq!(outcome.conservation_delta(), 0);
    }

    #[test]
    fn test_commission_floors_toward_zero() {
        assert_eq!(commission_for(999, 1000), 99);
        assert_eq!(commission_for(1, 1000), 0);
        assert_eq!(commission_for(10_000, 250), 250);
        assert_eq!(commission_for(0, 1000), 0);
    }

    #[test]
    fn test_commission_survives_large_stakes() {
        // i64::MAX-scale stake must not overflow the intermediate product
        let stake = i64::MAX / 2;
        let commission = commission_for(stake, 1000);
        assert_eq!(commission, stake / 10);
    }

    #[test]
    fn test_zero_rate_means_zero_commission() {
        let outcome = BetOutcome::compute(&matched(5_000, FightSide::A), FightWinner::A, 0);
        assert_eq!(
            outcome,
            BetOutcome::Decided {
                winner_id: 10,
                loser_id: 20,
                stake: 5_000,
                commission: 0,
            }
        );
    }
}
