//! Mock payment gateway for tests and local development.
//!
//! Simulates asynchronous provider confirmation: each initiated payment
//! resolves probabilistically to completed or failed once a short delay has
//! passed. `verify_payment` reports `Pending` until then, which exercises the
//! same reconciliation path used against a live gateway.

use super::gateway::{
    GatewayStatus, InitiateOutcome, PaymentError, PaymentGateway, PaymentResult,
};
use crate::wallet::{Amount, UserId};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct MockPayment {
    resolves_at: Instant,
    succeeds: bool,
    refunded: bool,
}

/// In-memory mock gateway
pub struct MockGateway {
    payments: RwLock<HashMap<String, MockPayment>>,
    /// Probability an initiated payment ends up completed
    success_rate: f64,
    delay: std::ops::Range<Duration>,
}

impl MockGateway {
    /// Create a mock with the production-like 1.5–3s confirmation delay
    pub fn new() -> Self {
        Self::with_behavior(0.85, Duration::from_millis(1500)..Duration::from_millis(3000))
    }

    /// Create a mock with explicit success rate and delay range
    pub fn with_behavior(success_rate: f64, delay: std::ops::Range<Duration>) -> Self {
        Self {
            payments: RwLock::new(HashMap::new()),
            success_rate,
            delay,
        }
    }

    /// Mock that confirms instantly and always succeeds, for tests that only
    /// care about the happy path
    pub fn instant() -> Self {
        Self::with_behavior(1.0, Duration::ZERO..Duration::from_nanos(1))
    }

    async fn register(&self) -> InitiateOutcome {
        let (delay, succeeds) = {
            let mut rng = rand::rng();
            let span = self.delay.end.saturating_sub(self.delay.start);
            let jitter = if span.is_zero() {
                Duration::ZERO
            } else {
                Duration::from_nanos(rng.random_range(0..span.as_nanos() as u64))
            };
            (self.delay.start + jitter, rng.random_bool(self.success_rate))
        };

        let transaction_id = format!("mock_{}", Uuid::new_v4());
        self.payments.write().await.insert(
            transaction_id.clone(),
            MockPayment {
                resolves_at: Instant::now() + delay,
                succeeds,
                refunded: false,
            },
        );

        InitiateOutcome {
            success: true,
            transaction_id,
            requires_user_action: true,
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initiate_deposit(
        &self,
        _amount: Amount,
        _phone_number: &str,
        _user_id: UserId,
    ) -> PaymentResult<InitiateOutcome> {
        Ok(self.register().await)
    }

    async fn initiate_withdrawal(
        &self,
        _amount: Amount,
        _phone_number: &str,
        _user_id: UserId,
    ) -> PaymentResult<InitiateOutcome> {
        Ok(self.register().await)
    }

    async fn verify_payment(&self, transaction_id: &str) -> PaymentResult<GatewayStatus> {
        let payments = self.payments.read().await;
        let payment = payments
            .get(transaction_id)
            .ok_or_else(|| PaymentError::UnknownTransaction(transaction_id.to_string()))?;

        Ok(if payment.refunded {
            GatewayStatus::Refunded
        } else if Instant::now() < payment.resolves_at {
            GatewayStatus::Pending
        } else if payment.succeeds {
            GatewayStatus::Completed
        } else {
            GatewayStatus::Failed
        })
    }

    async fn refund(&self, transaction_id: &str, _amount: Amount) -> PaymentResult<bool> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(transaction_id)
            .ok_or_else(|| PaymentError::UnknownTransaction(transaction_id.to_string()))?;

        if Instant::now() < payment.resolves_at || !payment.succeeds {
            return Ok(false);
        }
        payment.refunded = true;
        Ok(true)
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
