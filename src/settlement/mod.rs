//! Settlement: atomic bulk resolution of all accepted bets on a completed
//! fight.
//!
//! The pure money math lives in [`payout`]; [`manager`] drives the ledger and
//! journal inside a single database transaction per fight.

pub mod manager;
pub mod payout;

pub use manager::{SettlementError, SettlementManager, SettlementReport, SettlementResult};
pub use payout::{BetOutcome, MatchedBet, commission_for};
