//! Bet lifecycle module.
//!
//! A bet is a peer-to-peer wager between a creator and an acceptor on the
//! outcome of a fight. Every state transition that moves money runs in the
//! same database transaction as the ledger mutation, and contested
//! transitions (accept, cancel, expire) are compare-and-swaps on the stored
//! status.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{BetError, BetResult};
pub use manager::BetManager;
pub use models::{Bet, BetId, BetStatus};
