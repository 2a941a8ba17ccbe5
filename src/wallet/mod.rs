//! Wallet module providing the balance ledger with locked-fund escrow.
//!
//! This module implements:
//! - Per-user spendable and locked balances
//! - Atomic lock / unlock / credit / debit / transfer-locked primitives
//! - Row-serialized conditional updates (no in-process locking)
//! - Journal rows committed in the same transaction as every mutation
//!
//! ## Example
//!
//! ```no_run
//! use fightbook::db::{Database, DatabaseConfig};
//! use fightbook::wallet::WalletLedger;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let ledger = WalletLedger::new(Arc::new(db.pool().clone()));
//!
//!     // Lock funds toward a bet
//!     let after = ledger
//!         .lock(1, 3_000, "bet_lock_unique_key".to_string(), None)
//!         .await?;
//!     println!("Spendable after lock: {}", after.balance);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ledger;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use ledger::WalletLedger;
pub use models::{Amount, BalanceAfter, UserId, Wallet};
