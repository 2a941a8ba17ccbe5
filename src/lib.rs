//! # Fightbook
//!
//! A peer-to-peer fight wagering engine built around a strict wallet ledger.
//! Users lock funds against predicted fight outcomes; an administrator
//! validates the result, which settles every accepted bet on the fight in a
//! single atomic run.
//!
//! ## Architecture
//!
//! Money has exactly one owner at every moment. Each user's wallet carries a
//! spendable `balance` and a `locked_balance` committed to open bets and
//! withdrawal requests; the sum of the two changes only through a ledger
//! primitive, and every primitive commits together with its journal row.
//! Contested state transitions — accepting a bet, approving a withdrawal,
//! validating a result — are compare-and-swaps on the stored status, so
//! races lose cleanly instead of double-spending.
//!
//! ## Core Modules
//!
//! - [`wallet`]: the balance ledger and its atomic primitives
//! - [`journal`]: append-only record of every balance-affecting event
//! - [`bet`]: the wager lifecycle state machine
//! - [`settlement`]: bulk resolution of a fight's accepted bets
//! - [`withdrawal`]: two-phase request/approve money-out workflow
//! - [`payment`]: gateway adapters for external money movement
//! - [`funding`]: deposit flow and pending-payment reconciliation
//!
//! ## Example
//!
//! ```no_run
//! use fightbook::db::{Database, DatabaseConfig};
//! use fightbook::bet::BetManager;
//! use fightbook::fight::FightSide;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let bets = BetManager::new(Arc::new(db.pool().clone()));
//!
//!     let bet = bets
//!         .create(1, 42, 3_000, FightSide::A, "req_abc123".to_string())
//!         .await?;
//!     println!("bet {} pending", bet.id);
//!     Ok(())
//! }
//! ```

/// Database pool, configuration, and timeout helpers.
pub mod db;

/// Platform configuration (commission, withdrawal bounds, worker intervals).
pub mod config;

/// Wallet ledger with locked-fund escrow.
pub mod wallet;

/// Append-only transaction journal.
pub mod journal;

/// Fight records referenced by wagers.
pub mod fight;

/// Bet lifecycle state machine.
pub mod bet;

/// Settlement orchestrator and payout math.
pub mod settlement;

/// Two-phase withdrawal workflow.
pub mod withdrawal;

/// Payment gateway adapters.
pub mod payment;

/// Deposit flow and reconciliation worker.
pub mod funding;

/// Notification and audit collaborator interfaces.
pub mod events;

/// Shared TTL idempotency replay store.
pub mod idempotency;

pub use bet::{Bet, BetManager, BetStatus};
pub use config::PlatformConfig;
pub use fight::{Fight, FightSide, FightStatus, FightWinner};
pub use settlement::{SettlementManager, SettlementReport};
pub use wallet::{Wallet, WalletLedger};
pub use withdrawal::{WithdrawalManager, WithdrawalRequest, WithdrawalStatus};
