//! Interfaces to the notification and audit collaborators.
//!
//! Both are invoked after the ledger transaction commits and are strictly
//! best-effort: a delivery failure is logged, never propagated, and never
//! rolls anything back.

use crate::fight::{FightId, FightWinner};
use crate::wallet::{Amount, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fire-and-forget user-facing event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    WithdrawalApproved {
        user_id: UserId,
        amount: Amount,
        message: String,
    },
    WithdrawalRejected {
        user_id: UserId,
        amount: Amount,
        message: String,
    },
    BetSettled {
        user_id: UserId,
        amount: Amount,
        message: String,
    },
}

/// Structured record of an admin-triggered mutation, for compliance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    ResultValidated {
        admin_id: UserId,
        fight_id: FightId,
        winner: FightWinner,
        bets_settled: usize,
    },
    WithdrawalDecided {
        admin_id: UserId,
        request_id: i64,
        approved: bool,
    },
}

/// Notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an event to the user; best-effort
    async fn notify(&self, event: NotifyEvent) -> anyhow::Result<()>;
}

/// Audit collaborator
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an admin action; best-effort
    async fn record(&self, action: AdminAction) -> anyhow::Result<()>;
}

/// Notifier that writes events to the log; the default until a push
/// delivery collaborator is wired in
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: NotifyEvent) -> anyhow::Result<()> {
        log::info!("notify: {}", serde_json::to_string(&event)?);
        Ok(())
    }
}

/// Audit sink that writes records to the log
pub struct LogAudit;

#[async_trait]
impl AuditSink for LogAudit {
    async fn record(&self, action: AdminAction) -> anyhow::Result<()> {
        log::info!("audit: {}", serde_json::to_string(&action)?);
        Ok(())
    }
}
