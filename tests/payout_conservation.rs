//! Conservation tests for the settlement payout computation.
//!
//! Across the two parties of a bet, funds before settlement must equal funds
//! after settlement plus the commission deducted — for every result, stake,
//! and commission rate. All math is integer-exact; nothing may be lost to
//! rounding in the platform's favor.

#![allow(clippy::unreadable_literal)]

use fightbook::fight::{FightSide, FightWinner};
use fightbook::settlement::{BetOutcome, MatchedBet, commission_for};

fn matched(amount: i64, side: FightSide) -> MatchedBet {
    MatchedBet {
        bet_id: 1,
        creator_id: 100,
        acceptor_id: 200,
        amount,
        chosen_side: side,
    }
}

/// Simulate settlement against two wallets and return total holdings after
///
/// Both parties start with their stake locked; the outcome drives the same
/// unlock/transfer/commission moves the orchestrator performs.
fn apply(outcome: &BetOutcome, bet: &MatchedBet) -> (i64, i64) {
    // (balance, locked) per party, holding only the stake
    let mut creator = (0i64, bet.amount);
    let mut acceptor = (0i64, bet.amount);

    match outcome {
        BetOutcome::Draw { refund } => {
            creator = (creator.0 + refund, creator.1 - refund);
            acceptor = (acceptor.0 + refund, acceptor.1 - refund);
        }
        BetOutcome::Decided {
            winner_id,
            stake,
            commission,
            ..
        } => {
            let (winner, loser) = if *winner_id == bet.creator_id {
                (&mut creator, &mut acceptor)
            } else {
                (&mut acceptor, &mut creator)
            };
            // Winner's own stake unlocks, loser's stake transfers over,
            // commission comes off the credited balance.
            winner.0 += stake;
            winner.1 -= stake;
            loser.1 -= stake;
            winner.0 += stake;
            winner.0 -= commission;
        }
    }

    (creator.0 + creator.1, acceptor.0 + acceptor.1)
}

#[test]
fn test_decided_bet_conserves_minus_commission() {
    let test_cases = vec![
        (3_000, 1000),
        (1, 1000),
        (999, 1000),
        (5_000, 0),
        (1_000_000, 250),
        (7, 9999),
    ];

    for (amount, rate_bps) in test_cases {
        let bet = matched(amount, FightSide::A);
        let outcome = BetOutcome::compute(&bet, FightWinner::A, rate_bps);
        let (creator_total, acceptor_total) = apply(&outcome, &bet);
        let commission = commission_for(amount, rate_bps);

        assert_eq!(
            creator_total + acceptor_total,
            2 * amount - commission,
            "stake {amount} at {rate_bps}bps: {creator_total} + {acceptor_total} should equal pool minus commission"
        );
        assert_eq!(outcome.conservation_delta(), -commission);
    }
}

#[test]
fn test_draw_conserves_exactly() {
    for amount in [1, 300, 3_000, 1_000_000_000] {
        let bet = matched(amount, FightSide::B);
        let outcome = BetOutcome::compute(&bet, FightWinner::Draw, 1000);
        let (creator_total, acceptor_total) = apply(&outcome, &bet);

        assert_eq!(creator_total, amount, "draw must refund the creator in full");
        assert_eq!(acceptor_total, amount, "draw must refund the acceptor in full");
        assert_eq!(outcome.conservation_delta(), 0);
    }
}

#[test]
fn test_three_thousand_stake_at_ten_percent() {
    // Creator stakes 3,000 on side A at 10% commission; side A wins.
    // Winner nets 3,000 - 300, loser is out 3,000.
    let bet = matched(3_000, FightSide::A);
    match BetOutcome::compute(&bet, FightWinner::A, 1000) {
        BetOutcome::Decided {
            winner_id,
            loser_id,
            stake,
            commission,
        } => {
            assert_eq!(winner_id, 100);
            assert_eq!(loser_id, 200);
            assert_eq!(stake, 3_000);
            assert_eq!(commission, 300);
        }
        other => panic!("expected a decided outcome, got {other:?}"),
    }
}

#[test]
fn test_opposite_side_flips_winner() {
    let bet = matched(3_000, FightSide::A);
    match BetOutcome::compute(&bet, FightWinner::B, 1000) {
        BetOutcome::Decided { winner_id, loser_id, .. } => {
            assert_eq!(winner_id, 200, "acceptor holds the opposite corner");
            assert_eq!(loser_id, 100);
        }
        other => panic!("expected a decided outcome, got {other:?}"),
    }
}

#[test]
fn test_commission_never_exceeds_stake() {
    for amount in [1, 10, 12345, i64::MAX / 2] {
        for rate_bps in [0, 1, 500, 1000, 9999, 10_000] {
            let commission = commission_for(amount, rate_bps);
            assert!(commission >= 0);
            assert!(
                commission <= amount,
                "commission {commission} exceeds stake {amount} at {rate_bps}bps"
            );
        }
    }
}
