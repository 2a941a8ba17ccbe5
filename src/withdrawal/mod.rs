//! Two-phase withdrawal approval workflow.
//!
//! A user request locks the funds; an admin decision either debits them
//! permanently and hands the payout reference to the Payment Gateway flow
//! (approve), or returns them to the spendable balance (reject).

pub mod manager;
pub mod models;

pub use manager::{WithdrawalError, WithdrawalManager, WithdrawalResult};
pub use models::{RequestId, WithdrawalRequest, WithdrawalStatus};
