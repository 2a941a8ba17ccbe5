//! Money-in flow: deposits through the payment gateway, confirmed into the
//! ledger by a background reconciliation worker.

pub mod manager;
pub mod reconciler;

pub use manager::{DepositManager, FundingError, FundingResult};
pub use reconciler::Reconciler;
