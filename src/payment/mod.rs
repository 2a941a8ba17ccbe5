//! Payment gateway adapters.
//!
//! A single trait fronts every external money-in/money-out provider; real
//! implementations speak HTTP with a bounded timeout, and the mock simulates
//! delayed asynchronous confirmation for tests and local development.
//! Selection is a plain factory, not a DI container.

pub mod gateway;
pub mod http;
pub mod mock;

pub use gateway::{
    GatewayStatus, InitiateOutcome, PaymentError, PaymentGateway, PaymentResult,
    map_provider_status,
};
pub use http::{HttpGateway, HttpGatewayConfig};
pub use mock::MockGateway;

use std::sync::Arc;

/// Build the gateway named in configuration
///
/// `provider` is `"mock"` or a configured provider name; anything else needs
/// a base URL and API key from the environment.
pub fn gateway_for(
    provider: &str,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: u64,
) -> PaymentResult<Arc<dyn PaymentGateway>> {
    if provider == "mock" {
        return Ok(Arc::new(MockGateway::new()));
    }

    let base_url = base_url.ok_or_else(|| {
        PaymentError::Provider(format!("provider {provider} requires a base URL"))
    })?;
    let api_key = api_key.ok_or_else(|| {
        PaymentError::Provider(format!("provider {provider} requires an API key"))
    })?;

    Ok(Arc::new(HttpGateway::new(HttpGatewayConfig {
        provider: provider.to_string(),
        base_url,
        api_key,
        timeout_secs,
    })?))
}
