//! Chargily Pay v2 REST client.
//!
//! Every call authenticates with `Authorization: Bearer <secret key>` and is
//! bounded by the configured request timeout. Calls are attempted once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info, warn};
use url::Url;

use super::{redirect_url, Checkout, CheckoutRequest, PaymentGateway};
use crate::error::{preview, GatewayError};
use crate::Config;

/// HTTP client for the Chargily Pay API.
#[derive(Clone)]
pub struct ChargilyClient {
    http: Client,
    api_url: String,
    secret_key: Option<String>,
    timeout: Duration,
}

impl ChargilyClient {
    pub fn new(http: Client, api_url: String, secret_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            api_url,
            secret_key,
            timeout,
        }
    }

    pub fn from_config(http: Client, config: &Config) -> Self {
        Self::new(
            http,
            config.gateway_api_url.clone(),
            config.gateway_secret_key.clone(),
            config.request_timeout(),
        )
    }

    fn secret_key(&self) -> Result<&str, GatewayError> {
        self.secret_key.as_deref().ok_or(GatewayError::NotConfigured)
    }

    /// Join path segments onto the API base URL, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.api_url)?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value, GatewayError> {
        let key = self.secret_key()?;
        let url = self.endpoint(segments)?;

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(key)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status_code = status.as_u16(), "gateway_get_failed");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl PaymentGateway for ChargilyClient {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<Checkout, GatewayError> {
        let key = self.secret_key()?;
        let url = self.endpoint(&["checkouts"])?;

        info!(
            amount = request.amount,
            currency = %request.currency,
            has_email = request.metadata.contains_key("email"),
            "gateway_checkout_creating"
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, timeout = e.is_timeout(), "gateway_checkout_request_error"))?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(status_code = status.as_u16(), body = %preview(&body), "gateway_checkout_rejected");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let checkout = parse_checkout(&body)?;

        info!(
            checkout_id = checkout.id.as_deref().unwrap_or(""),
            "gateway_checkout_created"
        );

        Ok(checkout)
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<Value, GatewayError> {
        info!(customer_id = %customer_id, "gateway_customer_lookup");
        self.get_json(&["customers", customer_id]).await
    }

    async fn fetch_checkout(&self, checkout_id: &str) -> Result<Value, GatewayError> {
        info!(checkout_id = %checkout_id, "gateway_checkout_lookup");
        self.get_json(&["checkouts", checkout_id]).await
    }
}

/// Parse a create-checkout response body, requiring a non-empty `checkout_url`.
fn parse_checkout(body: &str) -> Result<Checkout, GatewayError> {
    let value: Value =
        serde_json::from_str(body).map_err(|_| GatewayError::MissingField("checkout_url"))?;

    let checkout_url = value
        .get("checkout_url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(GatewayError::MissingField("checkout_url"))?;
    let checkout_url = redirect_url(checkout_url)
        .ok_or_else(|| GatewayError::InvalidCheckoutUrl(checkout_url.to_string()))?;

    Ok(Checkout {
        id: value.get("id").and_then(Value::as_str).map(str::to_string),
        checkout_url: checkout_url.into(),
    })
}
