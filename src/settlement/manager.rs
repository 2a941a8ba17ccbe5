//! Settlement orchestrator: bulk resolution of every accepted bet on a fight.
#![allow(clippy::needless_raw_string_hashes)]

use super::payout::{BetOutcome, MatchedBet};
use crate::bet::BetId;
use crate::config::PlatformConfig;
use crate::events::{AdminAction, AuditSink, Notifier, NotifyEvent};
use crate::fight::{FightError, FightId, FightSide, FightStore, FightWinner};
use crate::journal::{self, JournalError, JournalKind, JournalStatus, NewJournalEntry};
use crate::wallet::{Amount, UserId, WalletError, WalletLedger};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Settlement errors
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Result already validated; payouts were applied exactly once before
    #[error("Fight {0} is already settled")]
    AlreadySettled(FightId),

    #[error("Fight error: {0}")]
    Fight(#[from] FightError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// A bet failed its invariant check mid-run; the whole fight rolled back
    /// and needs manual reconciliation
    #[error("Settlement invariant broken: {0}")]
    Invariant(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type SettlementResult<T> = Result<T, SettlementError>;

/// Summary of one settlement run
#[derive(Debug, Clone)]
pub struct SettlementReport {
    pub fight_id: FightId,
    pub winner: FightWinner,
    pub bets_settled: usize,
    /// Sum of stakes across settled bets (one side each)
    pub total_matched: Amount,
    pub total_commission: Amount,
}

/// Settlement orchestrator
///
/// The only bulk-mutation path in the system: one fight's result drives every
/// accepted bet on it through payout inside a single database transaction.
/// Either the whole fight settles or none of it does.
#[derive(Clone)]
pub struct SettlementManager {
    pool: Arc<PgPool>,
    config: PlatformConfig,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
}

impl SettlementManager {
    /// Create a new settlement manager
    pub fn new(
        pool: Arc<PgPool>,
        config: PlatformConfig,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            pool,
            config,
            notifier,
            audit,
        }
    }

    /// Validate a fight result and settle every accepted bet on it
    ///
    /// The caller (an admin) has already passed the out-of-band secondary
    /// factor with the authentication collaborator; this method trusts that
    /// authorization happened.
    ///
    /// The fight's `Completed` compare-and-swap is the idempotency guard: a
    /// second call for the same fight fails with `AlreadySettled` before any
    /// wallet is touched, so payouts apply exactly once no matter how often
    /// the request is retried.
    pub async fn validate_result(
        &self,
        admin_id: UserId,
        fight_id: FightId,
        winner: FightWinner,
    ) -> SettlementResult<SettlementReport> {
        let mut tx = self.pool.begin().await?;

        FightStore::complete_tx(&mut tx, fight_id, winner)
            .await
            .map_err(|e| match e {
                FightError::AlreadyCompleted(id) => SettlementError::AlreadySettled(id),
                other => SettlementError::Fight(other),
            })?;

        // Stable order: bets settle in creation order. Unaccepted pending
        // bets were expired by the sweep before the fight started.
        let bets = fetch_accepted_bets(&mut tx, fight_id).await?;

        let mut report = SettlementReport {
            fight_id,
            winner,
            bets_settled: 0,
            total_matched: 0,
            total_commission: 0,
        };
        let mut events = Vec::new();

        for bet in &bets {
            let outcome = BetOutcome::compute(bet, winner, self.config.commission_rate_bps);
            match outcome {
                BetOutcome::Draw { refund } => {
                    self.refund_draw(&mut tx, bet, refund, &mut events).await?;
                }
                BetOutcome::Decided {
                    winner_id,
                    loser_id,
                    stake,
                    commission,
                } => {
                    self.pay_out(&mut tx, bet, winner_id, loser_id, stake, commission, &mut events)
                        .await?;
                    report.total_commission += commission;
                }
            }

            mark_settled(&mut tx, bet.bet_id).await?;
            report.bets_settled += 1;
            report.total_matched += bet.amount;
        }

        tx.commit().await?;

        log::info!(
            "settled fight {fight_id}: {} bets, {} matched, {} commission",
            report.bets_settled,
            report.total_matched,
            report.total_commission
        );

        // Post-commit collaborators: delivery failures must never undo the
        // ledger, so they are logged and swallowed.
        for event in events {
            if let Err(e) = self.notifier.notify(event).await {
                log::warn!("settlement notification failed: {e}");
            }
        }
        if let Err(e) = self
            .audit
            .record(AdminAction::ResultValidated {
                admin_id,
                fight_id,
                winner,
                bets_settled: report.bets_settled,
            })
            .await
        {
            log::warn!("settlement audit record failed: {e}");
        }

        Ok(report)
    }

    /// Draw: both parties get their own stake back, no commission
    async fn refund_draw(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bet: &MatchedBet,
        refund: Amount,
        events: &mut Vec<NotifyEvent>,
    ) -> SettlementResult<()> {
        for (user_id, tag) in [(bet.creator_id, "creator"), (bet.acceptor_id, "acceptor")] {
            let after = WalletLedger::unlock_tx(tx, user_id, refund).await?;
            journal::append_tx(
                tx,
                NewJournalEntry {
                    user_id,
                    bet_id: Some(bet.bet_id),
                    kind: JournalKind::BetRefund,
                    amount: refund,
                    balance_after: after.balance,
                    status: JournalStatus::Confirmed,
                    provider: None,
                    external_ref: None,
                    idempotency_key: format!("bet_{}_refund_{tag}", bet.bet_id),
                    description: Some(format!("Bet {} refunded on draw", bet.bet_id)),
                },
            )
            .await?;

            events.push(NotifyEvent::BetSettled {
                user_id,
                amount: refund,
                message: format!("Bet {} ended in a draw; your stake was refunded", bet.bet_id),
            });
        }
        Ok(())
    }

    /// Decided bet: release the winner's stake, move the loser's stake over,
    /// then take the commission from the freshly credited winner.
    ///
    /// The commission is debited after the transfer rather than withheld from
    /// it, matching the journal shape of the rest of the system; both writes
    /// share the transaction, so the pre-commission balance is never visible
    /// outside it.
    #[allow(clippy::too_many_arguments)]
    async fn pay_out(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bet: &MatchedBet,
        winner_id: UserId,
        loser_id: UserId,
        stake: Amount,
        commission: Amount,
        events: &mut Vec<NotifyEvent>,
    ) -> SettlementResult<()> {
        let bet_id = bet.bet_id;

        // Winner's own stake comes off lock first.
        let after = WalletLedger::unlock_tx(tx, winner_id, stake).await?;
        journal::append_tx(
            tx,
            NewJournalEntry {
                user_id: winner_id,
                bet_id: Some(bet_id),
                kind: JournalKind::BetUnlock,
                amount: stake,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key: format!("bet_{bet_id}_settle_unlock"),
                description: Some(format!("Winning stake released for bet {bet_id}")),
            },
        )
        .await?;

        let (loser_after, winner_after) =
            WalletLedger::transfer_locked_tx(tx, loser_id, winner_id, stake).await?;
        journal::append_tx(
            tx,
            NewJournalEntry {
                user_id: winner_id,
                bet_id: Some(bet_id),
                kind: JournalKind::BetPayout,
                amount: stake,
                balance_after: winner_after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key: format!("bet_{bet_id}_payout_winner"),
                description: Some(format!("Payout won on bet {bet_id}")),
            },
        )
        .await?;
        journal::append_tx(
            tx,
            NewJournalEntry {
                user_id: loser_id,
                bet_id: Some(bet_id),
                kind: JournalKind::BetPayout,
                amount: -stake,
                balance_after: loser_after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key: format!("bet_{bet_id}_payout_loser"),
                description: Some(format!("Stake lost on bet {bet_id}")),
            },
        )
        .await?;

        if commission > 0 {
            let after = WalletLedger::debit_tx(tx, winner_id, commission).await?;
            journal::append_tx(
                tx,
                NewJournalEntry {
                    user_id: winner_id,
                    bet_id: Some(bet_id),
                    kind: JournalKind::Commission,
                    amount: -commission,
                    balance_after: after.balance,
                    status: JournalStatus::Confirmed,
                    provider: None,
                    external_ref: None,
                    idempotency_key: format!("bet_{bet_id}_commission"),
                    description: Some(format!("Platform commission on bet {bet_id}")),
                },
            )
            .await?;

            sqlx::query("INSERT INTO commissions (bet_id, amount) VALUES ($1, $2)")
                .bind(bet_id)
                .bind(commission)
                .execute(&mut **tx)
                .await?;
        }

        WalletLedger::record_win_tx(tx, winner_id, stake - commission).await?;
        WalletLedger::record_loss_tx(tx, loser_id, stake).await?;

        events.push(NotifyEvent::BetSettled {
            user_id: winner_id,
            amount: stake - commission,
            message: format!("You won bet {bet_id}"),
        });
        events.push(NotifyEvent::BetSettled {
            user_id: loser_id,
            amount: stake,
            message: format!("You lost bet {bet_id}"),
        });

        Ok(())
    }
}

/// Fetch accepted bets on a fight in creation order, locking the rows
async fn fetch_accepted_bets(
    tx: &mut Transaction<'_, Postgres>,
    fight_id: FightId,
) -> SettlementResult<Vec<MatchedBet>> {
    let rows = sqlx::query(
        r#"
        SELECT id, creator_id, acceptor_id, amount, chosen_side
        FROM bets
        WHERE fight_id = $1 AND status = 'accepted'
        ORDER BY created_at, id
        FOR UPDATE
        "#,
    )
    .bind(fight_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter()
        .map(|row| {
            let bet_id: BetId = row.get("id");
            let acceptor_id: Option<UserId> = row.get("acceptor_id");
            let chosen_side = FightSide::from_str(&row.get::<String, _>("chosen_side"))
                .map_err(SettlementError::Invariant)?;

            Ok(MatchedBet {
                bet_id,
                creator_id: row.get("creator_id"),
                acceptor_id: acceptor_id.ok_or_else(|| {
                    SettlementError::Invariant(format!("accepted bet {bet_id} has no acceptor"))
                })?,
                amount: row.get("amount"),
                chosen_side,
            })
        })
        .collect()
}

/// Flip a bet to settled; the row was selected FOR UPDATE, so a miss here
/// means the state machine was violated elsewhere.
async fn mark_settled(tx: &mut Transaction<'_, Postgres>, bet_id: BetId) -> SettlementResult<()> {
    let result = sqlx::query(
        "UPDATE bets SET status = 'settled', settled_at = NOW()
         WHERE id = $1 AND status = 'accepted'",
    )
    .bind(bet_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(SettlementError::Invariant(format!(
            "bet {bet_id} left accepted state during settlement"
        )));
    }
    Ok(())
}
