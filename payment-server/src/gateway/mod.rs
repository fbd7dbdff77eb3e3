//! Payment gateway module.
//!
//! The service needs three things from the gateway:
//! - create a hosted checkout and get back a URL to redirect the buyer to
//! - look up a customer when a webhook carries only a customer id
//! - look up a checkout from the synchronous return redirect
//!
//! Handlers talk to the [`PaymentGateway`] trait so tests can swap the HTTP
//! client for an in-memory double.

pub mod chargily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::GatewayError;

pub use chargily::ChargilyClient;

/// Parameters for a new hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub amount: u64,
    pub currency: String,
    pub success_url: String,
    pub failure_url: String,
    pub description: String,
    pub locale: String,
    /// Echoed back by the gateway in webhook events
    pub metadata: Map<String, Value>,
}

/// A checkout created by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Checkout {
    #[serde(default)]
    pub id: Option<String>,
    pub checkout_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<Checkout, GatewayError>;

    /// Fetch the customer-detail object for `customer_id`.
    async fn fetch_customer(&self, customer_id: &str) -> Result<Value, GatewayError>;

    /// Fetch the checkout object for `checkout_id`.
    async fn fetch_checkout(&self, checkout_id: &str) -> Result<Value, GatewayError>;
}

/// Parse `raw` as an absolute URL that is safe to put in a `Location` header.
///
/// `Url::parse` silently drops tabs and newlines, so control characters are
/// rejected up front instead of redirecting somewhere the operator did not
/// configure.
pub fn redirect_url(raw: &str) -> Option<Url> {
    if raw.chars().any(char::is_control) {
        return None;
    }
    Url::parse(raw).ok()
}
