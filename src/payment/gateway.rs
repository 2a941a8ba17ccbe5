//! Payment gateway contract.

use crate::wallet::{Amount, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Internal payment status vocabulary
///
/// Every provider's status strings map onto this set; nothing
/// provider-specific leaks past the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Result of initiating a deposit or withdrawal with a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateOutcome {
    pub success: bool,
    /// Provider-side reference for the payment
    pub transaction_id: String,
    /// Whether the user must confirm on their device (e.g. mobile-money PIN)
    pub requires_user_action: bool,
}

/// Payment gateway errors
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport failure talking to the provider
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider did not answer within the configured timeout
    #[error("Gateway timed out after {0} seconds")]
    Timeout(u64),

    /// Provider answered with an error or an unknown status
    #[error("Provider error: {0}")]
    Provider(String),

    /// No payment with this reference is known to the provider
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),
}

/// Result type for gateway operations
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Uniform interface to external money-in/money-out providers
///
/// The gateway never touches the ledger: deposit confirmation credits the
/// wallet through the funding flow, and withdrawal payouts are driven by the
/// approval workflow. Implementations only talk to the provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a money-in payment for the user's phone number
    async fn initiate_deposit(
        &self,
        amount: Amount,
        phone_number: &str,
        user_id: UserId,
    ) -> PaymentResult<InitiateOutcome>;

    /// Start a money-out payment to the user's phone number
    async fn initiate_withdrawal(
        &self,
        amount: Amount,
        phone_number: &str,
        user_id: UserId,
    ) -> PaymentResult<InitiateOutcome>;

    /// Ask the provider for the current status of a payment
    async fn verify_payment(&self, transaction_id: &str) -> PaymentResult<GatewayStatus>;

    /// Request a refund of a completed payment
    async fn refund(&self, transaction_id: &str, amount: Amount) -> PaymentResult<bool>;

    /// Provider name recorded on journal entries
    fn provider_name(&self) -> &str;
}

/// Map a provider's status string onto the internal vocabulary
///
/// Provider APIs disagree on wording; this accepts the union of the
/// vocabularies seen in the field.
pub fn map_provider_status(raw: &str) -> PaymentResult<GatewayStatus> {
    match raw.to_ascii_uppercase().as_str() {
        "PENDING" | "PROCESSING" | "INITIATED" | "SUBMITTED" => Ok(GatewayStatus::Pending),
        "COMPLETED" | "SUCCESS" | "SUCCESSFUL" | "SETTLED" => Ok(GatewayStatus::Completed),
        "FAILED" | "REJECTED" | "CANCELLED" | "EXPIRED" | "TIMEOUT" => Ok(GatewayStatus::Failed),
        "REFUNDED" | "REVERSED" => Ok(GatewayStatus::Refunded),
        other => Err(PaymentError::Provider(format!(
            "unrecognized provider status: {other}"
        ))),
    }
}
