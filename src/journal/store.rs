//! Journal persistence: in-transaction appends and read queries.
#![allow(clippy::needless_raw_string_hashes)]

use super::errors::{JournalError, JournalResult};
use super::models::{EntryId, JournalEntry, JournalKind, JournalStatus, NewJournalEntry};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use std::sync::Arc;

/// Append a journal entry inside an open transaction
///
/// Taking the transaction (rather than a pool) makes it impossible to write
/// the journal row outside the atomic unit of the ledger mutation it
/// documents. The unique idempotency-key index is the ledger-level duplicate
/// guard; a collision maps to `JournalError::DuplicateKey`.
pub async fn append_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry: NewJournalEntry,
) -> JournalResult<EntryId> {
    let result = sqlx::query(
        r#"
        INSERT INTO journal_entries
            (user_id, bet_id, kind, amount, balance_after, status, provider,
             external_ref, idempotency_key, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.bet_id)
    .bind(entry.kind.to_string())
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(entry.status.to_string())
    .bind(&entry.provider)
    .bind(&entry.external_ref)
    .bind(&entry.idempotency_key)
    .bind(&entry.description)
    .fetch_one(&mut **tx)
    .await;

    match result {
        Ok(row) => Ok(row.get("id")),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(JournalError::DuplicateKey(entry.idempotency_key))
        }
        Err(e) => Err(e.into()),
    }
}

/// Transition an entry's status inside an open transaction
///
/// Compare-and-swap on the stored status: the losing side of a concurrent
/// double-confirm matches no row and gets `InvalidTransition`. There is no
/// path that updates a `confirmed` row, which is what makes confirmed
/// entries immutable.
pub async fn mark_status_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry_id: EntryId,
    from: JournalStatus,
    to: JournalStatus,
) -> JournalResult<()> {
    let result = sqlx::query("UPDATE journal_entries SET status = $1 WHERE id = $2 AND status = $3")
        .bind(to.to_string())
        .bind(entry_id)
        .bind(from.to_string())
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(JournalError::InvalidTransition {
            entry_id,
            expected: from,
            requested: to,
        });
    }
    Ok(())
}

/// Confirm a pending entry and attach the provider reference, in one CAS
pub async fn confirm_with_ref_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry_id: EntryId,
    external_ref: &str,
) -> JournalResult<()> {
    let result = sqlx::query(
        "UPDATE journal_entries SET status = 'confirmed', external_ref = $1
         WHERE id = $2 AND status = 'pending'",
    )
    .bind(external_ref)
    .bind(entry_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(JournalError::InvalidTransition {
            entry_id,
            expected: JournalStatus::Pending,
            requested: JournalStatus::Confirmed,
        });
    }
    Ok(())
}

/// Confirm a pending entry and record the balance its credit produced
///
/// A pending deposit is written before the wallet moves, so its
/// `balance_after` is the pre-credit balance. The confirming transaction
/// fixes it up in the same CAS that flips the status, keeping every
/// confirmed row's `balance_after` true to the effect it documents.
pub async fn confirm_with_balance_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry_id: EntryId,
    balance_after: i64,
) -> JournalResult<()> {
    let result = sqlx::query(
        "UPDATE journal_entries SET status = 'confirmed', balance_after = $1
         WHERE id = $2 AND status = 'pending'",
    )
    .bind(balance_after)
    .bind(entry_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(JournalError::InvalidTransition {
            entry_id,
            expected: JournalStatus::Pending,
            requested: JournalStatus::Confirmed,
        });
    }
    Ok(())
}

/// Read-side queries over the journal
#[derive(Clone)]
pub struct JournalStore {
    pool: Arc<PgPool>,
}

impl JournalStore {
    /// Create a new journal store
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get journal entries for a user, newest first
    pub async fn entries_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> JournalResult<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, bet_id, kind, amount, balance_after, status,
                   provider, external_ref, idempotency_key, description, created_at
            FROM journal_entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Find an entry by its provider reference
    pub async fn find_by_external_ref(
        &self,
        external_ref: &str,
    ) -> JournalResult<Option<JournalEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, bet_id, kind, amount, balance_after, status,
                   provider, external_ref, idempotency_key, description, created_at
            FROM journal_entries
            WHERE external_ref = $1
            "#,
        )
        .bind(external_ref)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    /// Fetch pending entries of a kind, oldest first
    ///
    /// Used by the reconciliation worker to find deposits awaiting a
    /// provider verdict.
    pub async fn pending_of_kind(
        &self,
        kind: JournalKind,
        limit: i64,
    ) -> JournalResult<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, bet_id, kind, amount, balance_after, status,
                   provider, external_ref, idempotency_key, description, created_at
            FROM journal_entries
            WHERE kind = $1 AND status = 'pending'
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(kind.to_string())
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Count entries tied to a bet, by kind
    pub async fn count_for_bet(&self, bet_id: i64, kind: JournalKind) -> JournalResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM journal_entries WHERE bet_id = $1 AND kind = $2",
        )
        .bind(bet_id)
        .bind(kind.to_string())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.get("n"))
    }
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> JournalResult<JournalEntry> {
    let kind = JournalKind::from_str(&row.get::<String, _>("kind"))
        .map_err(JournalError::CorruptEntry)?;
    let status = JournalStatus::from_str(&row.get::<String, _>("status"))
        .map_err(JournalError::CorruptEntry)?;

    Ok(JournalEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        bet_id: row.get("bet_id"),
        kind,
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        status,
        provider: row.get("provider"),
        external_ref: row.get("external_ref"),
        idempotency_key: row.get("idempotency_key"),
        description: row.get("description"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}
