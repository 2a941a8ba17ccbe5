//! Wallet ledger implementation with locked-balance escrow.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{WalletError, WalletResult},
    models::{Amount, BalanceAfter, UserId, Wallet},
};
use crate::journal::{self, JournalError, JournalKind, JournalStatus, NewJournalEntry};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// Wallet ledger
///
/// Owns every mutation of `balance` and `locked_balance`. Each primitive is a
/// conditional row update (`WHERE balance >= $1`) so concurrent mutations of
/// the same wallet serialize on the row itself; no in-process lock is
/// involved, which keeps the invariants intact across multiple server
/// instances.
#[derive(Clone)]
pub struct WalletLedger {
    pool: Arc<PgPool>,
}

impl WalletLedger {
    /// Create a new wallet ledger
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get wallet for a user
    pub async fn get_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, locked_balance, total_won, total_lost,
                   total_withdrawn, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        Ok(wallet_from_row(&row))
    }

    /// Get wallet for a user, creating an empty one if it doesn't exist
    ///
    /// Used when a user account is provisioned; the wallet is created with
    /// zero balances in the same call.
    pub async fn get_or_create_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance, locked_balance, updated_at)
            VALUES ($1, 0, 0, NOW())
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, balance, locked_balance, total_won, total_lost,
                      total_withdrawn, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(wallet_from_row(&row))
    }

    /// Move `amount` from spendable balance to locked balance
    ///
    /// Standalone variant: opens its own transaction and writes the journal
    /// row in the same commit. Managers composing several primitives use
    /// [`WalletLedger::lock_tx`] instead.
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientFunds` - spendable balance below `amount`
    /// * `WalletError::DuplicateTransaction` - idempotency key already used
    pub async fn lock(
        &self,
        user_id: UserId,
        amount: Amount,
        idempotency_key: String,
        description: Option<String>,
    ) -> WalletResult<BalanceAfter> {
        let mut tx = self.pool.begin().await?;
        let after = Self::lock_tx(&mut tx, user_id, amount).await?;
        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id,
                bet_id: None,
                kind: JournalKind::BetLock,
                amount: -amount,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key,
                description,
            },
        )
        .await
        .map_err(journal_err)?;
        tx.commit().await?;
        Ok(after)
    }

    /// Release `amount` of locked balance back to spendable balance
    pub async fn unlock(
        &self,
        user_id: UserId,
        amount: Amount,
        idempotency_key: String,
        description: Option<String>,
    ) -> WalletResult<BalanceAfter> {
        let mut tx = self.pool.begin().await?;
        let after = Self::unlock_tx(&mut tx, user_id, amount).await?;
        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id,
                bet_id: None,
                kind: JournalKind::BetUnlock,
                amount,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key,
                description,
            },
        )
        .await
        .map_err(journal_err)?;
        tx.commit().await?;
        Ok(after)
    }

    /// Credit spendable balance (deposit confirmation, admin adjustment)
    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: JournalKind,
        idempotency_key: String,
        description: Option<String>,
    ) -> WalletResult<BalanceAfter> {
        let mut tx = self.pool.begin().await?;
        let after = Self::credit_tx(&mut tx, user_id, amount).await?;
        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id,
                bet_id: None,
                kind,
                amount,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key,
                description,
            },
        )
        .await
        .map_err(journal_err)?;
        tx.commit().await?;
        Ok(after)
    }

    /// Debit spendable balance (commission extraction, admin adjustment)
    pub async fn debit(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: JournalKind,
        idempotency_key: String,
        description: Option<String>,
    ) -> WalletResult<BalanceAfter> {
        let mut tx = self.pool.begin().await?;
        let after = Self::debit_tx(&mut tx, user_id, amount).await?;
        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id,
                bet_id: None,
                kind,
                amount: -amount,
                balance_after: after.balance,
                status: JournalStatus::Confirmed,
                provider: None,
                external_ref: None,
                idempotency_key,
                description,
            },
        )
        .await
        .map_err(journal_err)?;
        tx.commit().await?;
        Ok(after)
    }

    // --- Transaction-scoped primitives ---
    //
    // These run against a caller-owned transaction so a manager can compose
    // several ledger mutations, journal rows, and status transitions into a
    // single commit. A crash between any two of them rolls everything back.

    /// Lock funds inside an open transaction
    pub async fn lock_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<BalanceAfter> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        // Atomically move funds with a balance check; the conditional update
        // is what serializes concurrent locks on the same wallet.
        let result = sqlx::query(
            "UPDATE wallets
             SET balance = balance - $1,
                 locked_balance = locked_balance + $1,
                 updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance, locked_balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        match result {
            Some(row) => Ok(balance_after_from_row(&row)),
            None => Err(Self::classify_shortfall(tx, user_id, amount, false).await?),
        }
    }

    /// Unlock funds inside an open transaction
    ///
    /// Insufficient locked funds means an earlier lock was lost or released
    /// twice; surfaced as `InvalidState`, never as a user-facing error.
    pub async fn unlock_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<BalanceAfter> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let result = sqlx::query(
            "UPDATE wallets
             SET balance = balance + $1,
                 locked_balance = locked_balance - $1,
                 updated_at = NOW()
             WHERE user_id = $2 AND locked_balance >= $1
             RETURNING balance, locked_balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        match result {
            Some(row) => Ok(balance_after_from_row(&row)),
            None => Err(Self::classify_shortfall(tx, user_id, amount, true).await?),
        }
    }

    /// Credit spendable balance inside an open transaction
    pub async fn credit_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<BalanceAfter> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        // Row lock first so the overflow check and the update see the same
        // balance.
        let row = sqlx::query(
            "SELECT balance, locked_balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        let current: i64 = row.get("balance");
        let locked: i64 = row.get("locked_balance");
        let new_balance = current
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;

        sqlx::query("UPDATE wallets SET balance = $1, updated_at = NOW() WHERE user_id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        Ok(BalanceAfter {
            balance: new_balance,
            locked_balance: locked,
        })
    }

    /// Debit spendable balance inside an open transaction
    pub async fn debit_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<BalanceAfter> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let result = sqlx::query(
            "UPDATE wallets
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance, locked_balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        match result {
            Some(row) => Ok(balance_after_from_row(&row)),
            None => Err(Self::classify_shortfall(tx, user_id, amount, false).await?),
        }
    }

    /// Remove funds from locked balance permanently (withdrawal completion)
    pub async fn debit_locked_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<BalanceAfter> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let result = sqlx::query(
            "UPDATE wallets
             SET locked_balance = locked_balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND locked_balance >= $1
             RETURNING balance, locked_balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        match result {
            Some(row) => Ok(balance_after_from_row(&row)),
            None => Err(Self::classify_shortfall(tx, user_id, amount, true).await?),
        }
    }

    /// Move locked funds from the loser to the winner's spendable balance
    ///
    /// Used for payouts. Both rows update inside the caller's transaction, so
    /// either both wallets change or neither does.
    pub async fn transfer_locked_tx(
        tx: &mut Transaction<'_, Postgres>,
        from_user_id: UserId,
        to_user_id: UserId,
        amount: Amount,
    ) -> WalletResult<(BalanceAfter, BalanceAfter)> {
        let from_after = Self::debit_locked_tx(tx, from_user_id, amount).await?;
        let to_after = Self::credit_tx(tx, to_user_id, amount).await?;
        Ok((from_after, to_after))
    }

    /// Bump the winner's lifetime winnings counter
    pub async fn record_win_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<()> {
        sqlx::query("UPDATE wallets SET total_won = total_won + $1 WHERE user_id = $2")
            .bind(amount)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Bump the loser's lifetime losses counter
    pub async fn record_loss_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<()> {
        sqlx::query("UPDATE wallets SET total_lost = total_lost + $1 WHERE user_id = $2")
            .bind(amount)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Bump the lifetime withdrawn counter
    pub async fn record_withdrawal_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: Amount,
    ) -> WalletResult<()> {
        sqlx::query("UPDATE wallets SET total_withdrawn = total_withdrawn + $1 WHERE user_id = $2")
            .bind(amount)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Work out why a conditional update matched no row
    ///
    /// Either the wallet doesn't exist or the checked column was short.
    /// A short spendable balance is the user's problem; short locked funds
    /// signal a bookkeeping bug.
    async fn classify_shortfall(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        required: Amount,
        locked: bool,
    ) -> Result<WalletError, sqlx::Error> {
        let row = sqlx::query("SELECT balance, locked_balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(match row {
            Some(row) if locked => {
                let available: i64 = row.get("locked_balance");
                WalletError::InvalidState(format!(
                    "user {user_id}: locked balance {available} below required {required}"
                ))
            }
            Some(row) => {
                let available: i64 = row.get("balance");
                WalletError::InsufficientFunds {
                    available,
                    required,
                }
            }
            None => WalletError::WalletNotFound(user_id),
        })
    }
}

/// A replayed idempotency key is its own variant; everything else stays a
/// journal error.
fn journal_err(e: JournalError) -> WalletError {
    match e {
        JournalError::DuplicateKey(key) => WalletError::DuplicateTransaction(key),
        other => WalletError::Journal(other),
    }
}

fn wallet_from_row(row: &sqlx::postgres::PgRow) -> Wallet {
    Wallet {
        user_id: row.get("user_id"),
        balance: row.get("balance"),
        locked_balance: row.get("locked_balance"),
        total_won: row.get("total_won"),
        total_lost: row.get("total_lost"),
        total_withdrawn: row.get("total_withdrawn"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

fn balance_after_from_row(row: &sqlx::postgres::PgRow) -> BalanceAfter {
    BalanceAfter {
        balance: row.get("balance"),
        locked_balance: row.get("locked_balance"),
    }
}
