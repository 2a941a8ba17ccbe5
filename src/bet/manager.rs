//! Bet lifecycle manager.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{BetError, BetResult},
    models::{Bet, BetId, BetStatus},
};
use crate::fight::{FightId, FightSide, FightStore};
use crate::journal::{self, JournalKind, JournalStatus, NewJournalEntry};
use crate::wallet::{Amount, UserId, WalletLedger};
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::sync::Arc;

/// Bet lifecycle manager
///
/// Drives the `Pending → Accepted → Settled` state machine and keeps every
/// status change in the same database transaction as the ledger lock or
/// unlock it implies.
#[derive(Clone)]
pub struct BetManager {
    pool: Arc<PgPool>,
    fights: FightStore,
}

impl BetManager {
    /// Create a new bet manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        let fights = FightStore::new(pool.clone());
        Self { pool, fights }
    }

    /// Create a bet on a scheduled fight
    ///
    /// Locks `amount` on the creator's wallet and inserts the bet `Pending`,
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// * `BetError::Validation` - non-positive amount or fight not open
    /// * `WalletError::InsufficientFunds` - creator cannot cover the stake
    pub async fn create(
        &self,
        creator_id: UserId,
        fight_id: FightId,
        amount: Amount,
        side: FightSide,
        idempotency_key: String,
    ) -> BetResult<Bet> {
        if amount <= 0 {
            return Err(BetError::Validation(format!(
                "bet amount must be positive, got {amount}"
            )));
        }

        let fight = self.fights.get(fight_id).await?;
        if !fight.open_for_bets(Utc::now()) {
            return Err(BetError::Validation(format!(
                "fight {fight_id} is not open for bets"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO bets (fight_id, creator_id, amount, chosen_side, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, created_at
            "#,
        )
        .bind(fight_id)
        .bind(creator_id)
        .bind(amount)
        .bind(side.to_string())
        .fetch_one(&mut *tx)
        .await?;

        let bet_id: BetId = row.get("id");
        let created_at = row.get::<chrono::NaiveDateTime, _>("created_at").and_utc();

        let after = WalletLedger::lock_tx(&mut tx, creator_id, amount).await?;
        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id: creator_id,
                bet_id: Some(bet_id),
                kind: JournalKind::BetLock,
                amount: -amount,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key,
                description: Some(format!("Stake locked for bet {bet_id}")),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(Bet {
            id: bet_id,
            fight_id,
            creator_id,
            acceptor_id: None,
            amount,
            chosen_side: side,
            status: BetStatus::Pending,
            created_at,
            settled_at: None,
        })
    }

    /// Accept a pending bet, taking the opposite corner
    ///
    /// The transition is a compare-and-swap on the stored status, so of two
    /// concurrent acceptors exactly one wins; the other gets
    /// `BetError::Conflict`. The acceptor's stake locks in the same
    /// transaction as the status change.
    pub async fn accept(
        &self,
        acceptor_id: UserId,
        bet_id: BetId,
        idempotency_key: String,
    ) -> BetResult<Bet> {
        let bet = self.get(bet_id).await?;

        if bet.creator_id == acceptor_id {
            return Err(BetError::Validation(
                "cannot accept your own bet".to_string(),
            ));
        }
        if bet.status != BetStatus::Pending {
            return Err(BetError::Conflict(format!(
                "bet {bet_id} is {}, not pending",
                bet.status
            )));
        }

        let fight = self.fights.get(bet.fight_id).await?;
        if !fight.open_for_bets(Utc::now()) {
            return Err(BetError::Validation(format!(
                "fight {} is no longer open for bets",
                bet.fight_id
            )));
        }

        let mut tx = self.pool.begin().await?;

        // CAS on status; a racing acceptor matches no row.
        let result = sqlx::query(
            "UPDATE bets SET acceptor_id = $1, status = 'accepted'
             WHERE id = $2 AND status = 'pending'",
        )
        .bind(acceptor_id)
        .bind(bet_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BetError::Conflict(format!(
                "bet {bet_id} was accepted or closed concurrently"
            )));
        }

        let after = WalletLedger::lock_tx(&mut tx, acceptor_id, bet.amount).await?;
        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id: acceptor_id,
                bet_id: Some(bet_id),
                kind: JournalKind::BetLock,
                amount: -bet.amount,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key,
                description: Some(format!("Stake locked accepting bet {bet_id}")),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(Bet {
            acceptor_id: Some(acceptor_id),
            status: BetStatus::Accepted,
            ..bet
        })
    }

    /// Cancel a bet, releasing every lock it owns
    ///
    /// Creators may cancel only while the bet is unaccepted; admins may also
    /// cancel an accepted bet, in which case both parties get their own
    /// stake back.
    pub async fn cancel(&self, bet_id: BetId, actor_id: UserId, is_admin: bool) -> BetResult<Bet> {
        let bet = self.get(bet_id).await?;

        if !is_admin {
            if bet.creator_id != actor_id {
                return Err(BetError::Validation(format!(
                    "user {actor_id} does not own bet {bet_id}"
                )));
            }
            if bet.status != BetStatus::Pending {
                return Err(BetError::Conflict(format!(
                    "bet {bet_id} is {}, only pending bets can be cancelled",
                    bet.status
                )));
            }
        } else if bet.status.is_terminal() {
            return Err(BetError::Conflict(format!(
                "bet {bet_id} is already {}",
                bet.status
            )));
        }

        let mut tx = self.pool.begin().await?;

        // CAS on the status we authorized against, not merely any live
        // status. A cancel that read `pending` must lose to a concurrent
        // accept rather than cancel the just-matched bet with the acceptor's
        // stake still locked.
        let result = sqlx::query(
            "UPDATE bets SET status = 'cancelled' WHERE id = $1 AND status = $2",
        )
        .bind(bet_id)
        .bind(bet.status.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BetError::Conflict(format!(
                "bet {bet_id} changed state concurrently"
            )));
        }

        let after = WalletLedger::unlock_tx(&mut tx, bet.creator_id, bet.amount).await?;
        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id: bet.creator_id,
                bet_id: Some(bet_id),
                kind: JournalKind::BetUnlock,
                amount: bet.amount,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key: format!("bet_{bet_id}_cancel_creator"),
                description: Some(format!("Bet {bet_id} cancelled")),
            },
        )
        .await?;

        if bet.status == BetStatus::Accepted {
            // Admin cancel of a matched bet: the acceptor's stake goes back too.
            let acceptor_id = bet.acceptor_id.ok_or_else(|| {
                BetError::Conflict(format!("accepted bet {bet_id} has no acceptor"))
            })?;
            let after = WalletLedger::unlock_tx(&mut tx, acceptor_id, bet.amount).await?;
            journal::append_tx(
                &mut tx,
                NewJournalEntry {
                    user_id: acceptor_id,
                    bet_id: Some(bet_id),
                    kind: JournalKind::BetUnlock,
                    amount: bet.amount,
                    balance_after: after.balance,
                    status: JournalStatus::Confirmed,
                    provider: None,
                    external_ref: None,
                    idempotency_key: format!("bet_{bet_id}_cancel_acceptor"),
                    description: Some(format!("Bet {bet_id} cancelled by admin")),
                },
            )
            .await?;
        }

        tx.commit().await?;

        Ok(Bet {
            status: BetStatus::Cancelled,
            ..bet
        })
    }

    /// Expire every pending bet whose fight has started
    ///
    /// System-driven sweep, safe to re-run: each bet transitions through a
    /// compare-and-swap and the journal keys are deterministic, so an
    /// already-expired bet is a no-op. Returns the number of bets expired.
    pub async fn sweep_expired(&self) -> BetResult<usize> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.creator_id, b.amount
            FROM bets b
            JOIN fights f ON f.id = b.fight_id
            WHERE b.status = 'pending' AND f.starts_at <= NOW()
            ORDER BY b.id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut expired = 0;
        for row in rows {
            let bet_id: BetId = row.get("id");
            let creator_id: UserId = row.get("creator_id");
            let amount: Amount = row.get("amount");

            let mut tx = self.pool.begin().await?;

            let result =
                sqlx::query("UPDATE bets SET status = 'expired' WHERE id = $1 AND status = 'pending'")
                    .bind(bet_id)
                    .execute(&mut *tx)
                    .await?;

            // Lost to a concurrent accept or cancel; nothing to release.
            if result.rows_affected() == 0 {
                continue;
            }

            let after = WalletLedger::unlock_tx(&mut tx, creator_id, amount).await?;
            journal::append_tx(
                &mut tx,
                NewJournalEntry {
                    user_id: creator_id,
                    bet_id: Some(bet_id),
                    kind: JournalKind::BetUnlock,
                    amount,
                    balance_after: after.balance,
                    status: JournalStatus::Confirmed,
                    provider: None,
                    external_ref: None,
                    idempotency_key: format!("bet_{bet_id}_expire"),
                    description: Some(format!("Bet {bet_id} expired unaccepted")),
                },
            )
            .await?;

            tx.commit().await?;
            expired += 1;

            log::info!("expired unaccepted bet {bet_id}, released {amount} to user {creator_id}");
        }

        Ok(expired)
    }

    /// Get a bet by ID
    pub async fn get(&self, bet_id: BetId) -> BetResult<Bet> {
        let row = sqlx::query(
            r#"
            SELECT id, fight_id, creator_id, acceptor_id, amount, chosen_side,
                   status, created_at, settled_at
            FROM bets
            WHERE id = $1
            "#,
        )
        .bind(bet_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(BetError::NotFound(bet_id))?;

        bet_from_row(&row)
    }

    /// List non-terminal bets on a fight, oldest first
    pub async fn open_bets_for_fight(&self, fight_id: FightId) -> BetResult<Vec<Bet>> {
        let rows = sqlx::query(
            r#"
            SELECT id, fight_id, creator_id, acceptor_id, amount, chosen_side,
                   status, created_at, settled_at
            FROM bets
            WHERE fight_id = $1 AND status IN ('pending', 'accepted')
            ORDER BY created_at, id
            "#,
        )
        .bind(fight_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(bet_from_row).collect()
    }
}

pub(crate) fn bet_from_row(row: &sqlx::postgres::PgRow) -> BetResult<Bet> {
    let chosen_side = FightSide::from_str(&row.get::<String, _>("chosen_side"))
        .map_err(BetError::Validation)?;
    let status =
        BetStatus::from_str(&row.get::<String, _>("status")).map_err(BetError::Validation)?;

    Ok(Bet {
        id: row.get("id"),
        fight_id: row.get("fight_id"),
        creator_id: row.get("creator_id"),
        acceptor_id: row.get("acceptor_id"),
        amount: row.get("amount"),
        chosen_side,
        status,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        settled_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("settled_at")
            .map(|t| t.and_utc()),
    })
}
