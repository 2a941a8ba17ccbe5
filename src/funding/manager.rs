//! Deposit flow: gateway initiation and ledger confirmation.
//!
//! Initiation and confirmation are two separate atomic units linked only by
//! the provider reference; the gateway call never runs with a database
//! transaction open.
#![allow(clippy::needless_raw_string_hashes)]

use crate::journal::{
    self, JournalEntry, JournalError, JournalKind, JournalStatus, JournalStore, NewJournalEntry,
};
use crate::payment::{GatewayStatus, InitiateOutcome, PaymentError, PaymentGateway};
use crate::wallet::{Amount, UserId, WalletError, WalletLedger};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

/// Deposit flow errors
#[derive(Debug, Error)]
pub enum FundingError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Provider failure; the journal entry degrades to pending/failed and the
    /// user retries. Never retried automatically against the ledger.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] PaymentError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No pending deposit with reference {0}")]
    UnknownReference(String),
}

pub type FundingResult<T> = Result<T, FundingError>;

/// Deposit manager
#[derive(Clone)]
pub struct DepositManager {
    pool: Arc<PgPool>,
    journal: JournalStore,
    gateway: Arc<dyn PaymentGateway>,
}

impl DepositManager {
    /// Create a new deposit manager
    pub fn new(pool: Arc<PgPool>, gateway: Arc<dyn PaymentGateway>) -> Self {
        let journal = JournalStore::new(pool.clone());
        Self {
            pool,
            journal,
            gateway,
        }
    }

    /// Start a deposit: ask the gateway for a payment, then record it pending
    ///
    /// The wallet is not credited here; only a confirmed provider verdict
    /// (via [`DepositManager::confirm`] or the reconciler) moves money.
    pub async fn initiate(
        &self,
        user_id: UserId,
        amount: Amount,
        phone_number: &str,
        idempotency_key: String,
    ) -> FundingResult<InitiateOutcome> {
        if amount <= 0 {
            return Err(FundingError::Validation(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }

        // Gateway first, with no transaction held open across the call.
        let outcome = self
            .gateway
            .initiate_deposit(amount, phone_number, user_id)
            .await?;

        let mut tx = self.pool.begin().await?;
        let wallet_balance: i64 =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(WalletError::WalletNotFound(user_id))
                .map_err(FundingError::Wallet)?;

        journal::append_tx(
            &mut tx,
            NewJournalEntry {
                user_id,
                bet_id: None,
                kind: JournalKind::Deposit,
                amount,
                balance_after: wallet_balance,
                status: JournalStatus::Pending,
                provider: Some(self.gateway.provider_name().to_string()),
                external_ref: Some(outcome.transaction_id.clone()),
                idempotency_key,
                description: Some(format!("Deposit via {}", self.gateway.provider_name())),
            },
        )
        .await?;
        tx.commit().await?;

        Ok(outcome)
    }

    /// Confirm a pending deposit: credit the wallet in the same commit as the
    /// journal status flip
    pub async fn confirm(&self, external_ref: &str) -> FundingResult<JournalEntry> {
        let entry = self.pending_entry(external_ref).await?;

        let mut tx = self.pool.begin().await?;
        let after = WalletLedger::credit_tx(&mut tx, entry.user_id, entry.amount).await?;
        // The pending row carried the pre-credit balance; the confirming CAS
        // rewrites balance_after to the balance this credit produced.
        journal::confirm_with_balance_tx(&mut tx, entry.id, after.balance).await?;
        tx.commit().await?;

        log::info!(
            "confirmed deposit {external_ref}: credited {} to user {}",
            entry.amount,
            entry.user_id
        );
        Ok(JournalEntry {
            status: JournalStatus::Confirmed,
            balance_after: after.balance,
            ..entry
        })
    }

    /// Mark a pending deposit failed; the ledger is untouched
    pub async fn fail(&self, external_ref: &str) -> FundingResult<JournalEntry> {
        self.close_pending(external_ref, JournalStatus::Failed).await
    }

    /// Mark a pending deposit refunded at the provider; the ledger is
    /// untouched since no credit was ever applied
    pub async fn mark_refunded(&self, external_ref: &str) -> FundingResult<JournalEntry> {
        self.close_pending(external_ref, JournalStatus::Refunded).await
    }

    async fn close_pending(
        &self,
        external_ref: &str,
        to: JournalStatus,
    ) -> FundingResult<JournalEntry> {
        let entry = self.pending_entry(external_ref).await?;

        let mut tx = self.pool.begin().await?;
        journal::mark_status_tx(&mut tx, entry.id, JournalStatus::Pending, to).await?;
        tx.commit().await?;

        log::info!("deposit {external_ref} closed as {to} at the provider");
        Ok(JournalEntry { status: to, ..entry })
    }

    /// Drive one pending deposit through a provider status check
    ///
    /// Returns the verdict applied. `Pending` and gateway timeouts leave the
    /// entry untouched for the next pass.
    pub async fn reconcile_one(&self, entry: &JournalEntry) -> FundingResult<GatewayStatus> {
        let external_ref = entry
            .external_ref
            .as_deref()
            .ok_or_else(|| FundingError::UnknownReference(format!("entry {}", entry.id)))?;

        let status = self.gateway.verify_payment(external_ref).await?;
        match status {
            GatewayStatus::Completed => {
                self.confirm(external_ref).await?;
            }
            GatewayStatus::Failed => {
                self.fail(external_ref).await?;
            }
            GatewayStatus::Refunded => {
                self.mark_refunded(external_ref).await?;
            }
            GatewayStatus::Pending => {}
        }
        Ok(status)
    }

    /// Pending deposits awaiting a provider verdict, oldest first
    pub async fn pending_deposits(&self, limit: i64) -> FundingResult<Vec<JournalEntry>> {
        Ok(self.journal.pending_of_kind(JournalKind::Deposit, limit).await?)
    }

    async fn pending_entry(&self, external_ref: &str) -> FundingResult<JournalEntry> {
        let entry = self
            .journal
            .find_by_external_ref(external_ref)
            .await?
            .ok_or_else(|| FundingError::UnknownReference(external_ref.to_string()))?;

        if entry.status != JournalStatus::Pending || entry.kind != JournalKind::Deposit {
            return Err(FundingError::UnknownReference(external_ref.to_string()));
        }
        Ok(entry)
    }
}
