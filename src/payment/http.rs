//! HTTP payment gateway implementation.
//!
//! Speaks a JSON API common to the mobile-money aggregators the platform
//! integrates with: collections for money-in, payouts for money-out, a
//! status endpoint, and refunds. Provider-specific status wording is mapped
//! at this boundary.

use super::gateway::{
    GatewayStatus, InitiateOutcome, PaymentError, PaymentGateway, PaymentResult,
    map_provider_status,
};
use crate::wallet::{Amount, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// HTTP gateway configuration
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Provider name recorded on journal entries
    pub provider: String,
    /// API base URL
    pub base_url: String,
    /// Bearer token for the provider API
    pub api_key: String,
    /// Whole-call timeout in seconds
    pub timeout_secs: u64,
}

/// HTTP-backed payment gateway
pub struct HttpGateway {
    config: HttpGatewayConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct InitiateRequest<'a> {
    amount: Amount,
    phone_number: &'a str,
    reference: String,
    metadata_user_id: UserId,
}

#[derive(Deserialize)]
struct InitiateResponse {
    status: String,
    transaction_id: String,
    #[serde(default)]
    requires_user_action: bool,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Deserialize)]
struct RefundResponse {
    accepted: bool,
}

impl HttpGateway {
    /// Create a gateway client with the configured bounded timeout
    pub fn new(config: HttpGatewayConfig) -> PaymentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    async fn initiate(
        &self,
        endpoint: &str,
        amount: Amount,
        phone_number: &str,
        user_id: UserId,
    ) -> PaymentResult<InitiateOutcome> {
        let url = format!("{}/{endpoint}", self.config.base_url);
        let body = InitiateRequest {
            amount,
            phone_number,
            reference: Uuid::new_v4().to_string(),
            metadata_user_id: user_id,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(PaymentError::Provider(format!(
                "{} returned HTTP {}",
                self.config.provider,
                response.status()
            )));
        }

        let parsed: InitiateResponse = response.json().await?;
        let status = map_provider_status(&parsed.status)?;

        Ok(InitiateOutcome {
            success: status != GatewayStatus::Failed,
            transaction_id: parsed.transaction_id,
            requires_user_action: parsed.requires_user_action,
        })
    }

    /// reqwest reports its own timeout as a request error; surface it as a
    /// distinct variant so callers can leave the payment pending and retry.
    fn classify(&self, e: reqwest::Error) -> PaymentError {
        if e.is_timeout() {
            PaymentError::Timeout(self.config.timeout_secs)
        } else {
            PaymentError::Http(e)
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn initiate_deposit(
        &self,
        amount: Amount,
        phone_number: &str,
        user_id: UserId,
    ) -> PaymentResult<InitiateOutcome> {
        self.initiate("collections", amount, phone_number, user_id)
            .await
    }

    async fn initiate_withdrawal(
        &self,
        amount: Amount,
        phone_number: &str,
        user_id: UserId,
    ) -> PaymentResult<InitiateOutcome> {
        self.initiate("payouts", amount, phone_number, user_id).await
    }

    async fn verify_payment(&self, transaction_id: &str) -> PaymentResult<GatewayStatus> {
        let url = format!(
            "{}/transactions/{transaction_id}",
            self.config.base_url
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::UnknownTransaction(transaction_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(PaymentError::Provider(format!(
                "{} returned HTTP {}",
                self.config.provider,
                response.status()
            )));
        }

        let parsed: StatusResponse = response.json().await?;
        map_provider_status(&parsed.status)
    }

    async fn refund(&self, transaction_id: &str, amount: Amount) -> PaymentResult<bool> {
        let url = format!("{}/refunds", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "transaction_id": transaction_id,
                "amount": amount,
            }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(PaymentError::Provider(format!(
                "{} refund returned HTTP {}",
                self.config.provider,
                response.status()
            )));
        }

        let parsed: RefundResponse = response.json().await?;
        Ok(parsed.accepted)
    }

    fn provider_name(&self) -> &str {
        &self.config.provider
    }
}
