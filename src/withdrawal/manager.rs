//! Two-phase withdrawal workflow: user request, admin approve/reject.
#![allow(clippy::needless_raw_string_hashes)]

use super::models::{RequestId, WithdrawalRequest, WithdrawalStatus};
use crate::config::PlatformConfig;
use crate::events::{AdminAction, AuditSink, Notifier, NotifyEvent};
use crate::journal::{self, JournalError, JournalKind, JournalStatus, NewJournalEntry};
use crate::wallet::{Amount, UserId, WalletError, WalletLedger};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Withdrawal errors
#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Withdrawal request not found: {0}")]
    NotFound(RequestId),

    /// Request already processed; double approve/reject loses the CAS
    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type WithdrawalResult<T> = Result<T, WithdrawalError>;

/// Withdrawal workflow manager
///
/// Requesting locks the funds; the admin decision either debits them
/// permanently (approve) or returns them (reject). Both decision branches
/// compare-and-swap on the stored `pending` status, so a request can never
/// be processed twice.
#[derive(Clone)]
pub struct WithdrawalManager {
    pool: Arc<PgPool>,
    config: PlatformConfig,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
}

impl WithdrawalManager {
    /// Create a new withdrawal manager
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

    /// Request a withdrawal, locking the amount
    ///
    /// # Errors
    ///
    /// * `WithdrawalError::Validation` - amount outside configured bounds
    /// * `WalletError::InsufficientFunds` - spendable balance too low
    pub async fn request(
        &self,
        user_id: UserId,
        amount: Amount,
        idempotency_key: String,
    ) -> WithdrawalResult<WithdrawalRequest> {
        if amount < self.config.withdrawal_min || amount > self.config.withdrawal_max {
            return Err(WithdrawalError::Validation(format!(
                "withdrawal amount {amount} outside allowed range {}..{}",
                self.config.withdrawal_min, self.config.withdrawal_max
            )));
        }

        let mut tx = self.pool.begin().await?;

        let after = WalletLedger::lock_tx(&mut tx, user_id, amount).await?;

        let row = sqlx::query(
            r#"
            INSERT INTO withdrawal_requests (user_id, amount, status)
            VALUES ($1, $2, 'pending')
            RETURNING id, requested_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        let request_id: RequestId = row.get("id");

        // Pending journal row documents the lock; the admin decision will
        // confirm it (approve) or flip it to refunded (reject).
        let entry_id = journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id,
                bet_id: None,
                kind: JournalKind::Withdrawal,
                amount: -amount,
                balance_after: after.balance,
                status: JournalStatus::Pending,
                provider: None,
                external_ref: None,
                idempotency_key,
                description: Some(format!("Withdrawal request {request_id}")),
            },
        )
        .await?;

        sqlx::query("UPDATE withdrawal_requests SET journal_entry_id = $1 WHERE id = $2")
            .bind(entry_id)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(WithdrawalRequest {
            id: request_id,
            user_id,
            amount,
            status: WithdrawalStatus::Pending,
            requested_at: row.get::<chrono::NaiveDateTime, _>("requested_at").and_utc(),
            processed_at: None,
            approved_by: None,
            transaction_ref: None,
            reason: None,
        })
    }

    /// Approve a pending request: the locked funds leave the platform
    ///
    /// `transaction_ref` is the gateway reference for the payout that the
    /// admin already initiated with the provider.
    pub async fn approve(
        &self,
        admin_id: UserId,
        request_id: RequestId,
        transaction_ref: String,
    ) -> WithdrawalResult<WithdrawalRequest> {
        let request = self.get(request_id).await?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE withdrawal_requests
             SET status = 'approved', processed_at = NOW(), approved_by = $1,
                 transaction_ref = $2
             WHERE id = $3 AND status = 'pending'
             RETURNING processed_at",
        )
        .bind(admin_id)
        .bind(&transaction_ref)
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            WithdrawalError::Conflict(format!(
                "withdrawal request {request_id} already processed"
            ))
        })?;
        let processed_at = row.get::<chrono::NaiveDateTime, _>("processed_at").and_utc();

        WalletLedger::debit_locked_tx(&mut tx, request.user_id, request.amount).await?;
        WalletLedger::record_withdrawal_tx(&mut tx, request.user_id, request.amount).await?;

        if let Some(entry_id) = self.journal_entry_id(request_id, &mut tx).await? {
            journal::confirm_with_ref_tx(&mut tx, entry_id, &transaction_ref).await?;
        }

        tx.commit().await?;

        self.settle_decision(
            admin_id,
            request_id,
            true,
            NotifyEvent::WithdrawalApproved {
                user_id: request.user_id,
                amount: request.amount,
                message: format!("Withdrawal of {} approved", request.amount),
            },
        )
        .await;

        Ok(WithdrawalRequest {
            status: WithdrawalStatus::Approved,
            processed_at: Some(processed_at),
            approved_by: Some(admin_id),
            transaction_ref: Some(transaction_ref),
            ..request
        })
    }

    /// Reject a pending request: locked funds return to the available balance
    pub async fn reject(
        &self,
        admin_id: UserId,
        request_id: RequestId,
        reason: String,
    ) -> WithdrawalResult<WithdrawalRequest> {
        let request = self.get(request_id).await?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE withdrawal_requests
             SET status = 'rejected', processed_at = NOW(), approved_by = $1, reason = $2
             WHERE id = $3 AND status = 'pending'
             RETURNING processed_at",
        )
        .bind(admin_id)
        .bind(&reason)
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            WithdrawalError::Conflict(format!(
                "withdrawal request {request_id} already processed"
            ))
        })?;
        let processed_at = row.get::<chrono::NaiveDateTime, _>("processed_at").and_utc();

        WalletLedger::unlock_tx(&mut tx, request.user_id, request.amount).await?;

        if let Some(entry_id) = self.journal_entry_id(request_id, &mut tx).await? {
            journal::mark_status_tx(
                &mut tx,
                entry_id,
                JournalStatus::Pending,
                JournalStatus::Refunded,
            )
            .await?;
        }

        tx.commit().await?;

        self.settle_decision(
            admin_id,
            request_id,
            false,
            NotifyEvent::WithdrawalRejected {
                user_id: request.user_id,
                amount: request.amount,
                message: format!("Withdrawal of {} rejected: {reason}", request.amount),
            },
        )
        .await;

        Ok(WithdrawalRequest {
            status: WithdrawalStatus::Rejected,
            processed_at: Some(processed_at),
            reason: Some(reason),
            ..request
        })
    }

    /// Get a withdrawal request by ID
    pub async fn get(&self, request_id: RequestId) -> WithdrawalResult<WithdrawalRequest> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, amount, status, requested_at, processed_at,
                   approved_by, transaction_ref, reason
            FROM withdrawal_requests
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(WithdrawalError::NotFound(request_id))?;

        let status = WithdrawalStatus::from_str(&row.get::<String, _>("status"))
            .map_err(WithdrawalError::Validation)?;

        Ok(WithdrawalRequest {
            id: row.get("id"),
            user_id: row.get("user_id"),
            amount: row.get("amount"),
            status,
            requested_at: row.get::<chrono::NaiveDateTime, _>("requested_at").and_utc(),
            processed_at: row
                .get::<Option<chrono::NaiveDateTime>, _>("processed_at")
                .map(|t| t.and_utc()),
            approved_by: row.get("approved_by"),
            transaction_ref: row.get("transaction_ref"),
            reason: row.get("reason"),
        })
    }

    /// List pending requests, oldest first (admin queue)
    pub async fn pending(&self, limit: i64) -> WithdrawalResult<Vec<RequestId>> {
        let rows = sqlx::query(
            "SELECT id FROM withdrawal_requests WHERE status = 'pending'
             ORDER BY requested_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn journal_entry_id(
        &self,
        request_id: RequestId,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> WithdrawalResult<Option<i64>> {
        let row = sqlx::query("SELECT journal_entry_id FROM withdrawal_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.and_then(|r| r.get("journal_entry_id")))
    }

    /// Post-commit notification and audit; failures logged, never propagated
    async fn settle_decision(
        &self,
        admin_id: UserId,
        request_id: RequestId,
        approved: bool,
        event: NotifyEvent,
    ) {
        if let Err(e) = self.notifier.notify(event).await {
            log::warn!("withdrawal notification failed: {e}");
        }
        if let Err(e) = self
            .audit
            .record(AdminAction::WithdrawalDecided {
                admin_id,
                request_id,
                approved,
            })
            .await
        {
            log::warn!("withdrawal audit record failed: {e}");
        }
    }
}
