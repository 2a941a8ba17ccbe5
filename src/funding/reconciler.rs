//! Background reconciliation of pending deposits.
//!
//! A worker loop polls `pending` deposit journal entries and asks the gateway
//! for a verdict on each. This replaces any callback-driven confirmation: the
//! request that initiated a deposit never owns its confirmation, so a crashed
//! server or a slow provider only delays the credit, never loses it.

use super::manager::DepositManager;
use crate::config::PlatformConfig;
use crate::payment::PaymentError;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Deposit reconciliation worker
pub struct Reconciler {
    deposits: DepositManager,
    interval: Duration,
    batch: i64,
}

impl Reconciler {
    /// Create a reconciler from platform configuration
    pub fn new(deposits: DepositManager, config: &PlatformConfig) -> Self {
        Self {
            deposits,
            interval: Duration::from_secs(config.reconcile_interval_secs),
            batch: config.reconcile_batch,
        }
    }

    /// Run one reconciliation pass; returns how many entries got a verdict
    pub async fn run_once(&self) -> usize {
        let pending = match self.deposits.pending_deposits(self.batch).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("reconciler could not list pending deposits: {e}");
                return 0;
            }
        };

        let mut resolved = 0;
        for entry in &pending {
            match self.deposits.reconcile_one(entry).await {
                Ok(status) => {
                    if status != crate::payment::GatewayStatus::Pending {
                        resolved += 1;
                    }
                }
                // Timeouts and transport errors leave the entry pending for
                // the next pass; they are never an excuse to touch the ledger.
                Err(super::manager::FundingError::Gateway(PaymentError::Timeout(secs))) => {
                    log::warn!(
                        "verification of deposit entry {} timed out after {secs}s",
                        entry.id
                    );
                }
                Err(e) => {
                    log::warn!("reconciling deposit entry {} failed: {e}", entry.id);
                }
            }
        }
        resolved
    }

    /// Spawn the worker loop
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let resolved = self.run_once().await;
                if resolved > 0 {
                    log::debug!("reconciler resolved {resolved} deposits");
                }
            }
        })
    }
}
