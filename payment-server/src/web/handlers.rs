//! HTTP endpoint handlers.
//!
//! The webhook handler is deliberately thin: it captures the raw body,
//! records it for inspection, enqueues it and answers. Everything else about
//! a webhook happens in the background worker.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::fulfill::{plausible_email, spawn_worker, EventQueue, Fulfiller, InboundEvent, PaymentReturn};
use crate::error::GatewayError;
use crate::gateway::{redirect_url, CheckoutRequest, PaymentGateway};
use crate::history::{WebhookHistory, WebhookSnapshot};
use crate::mail::{FulfillmentRecord, Mailer};
use crate::web::error::ApiError;
use crate::web::signature::signature_from_headers;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub fulfiller: Arc<Fulfiller>,
    pub history: WebhookHistory,
    pub queue: EventQueue,
}

impl AppState {
    /// Build the state and start the background fulfillment worker.
    ///
    /// The worker exits once every clone of the returned state is dropped.
    pub fn with_worker(
        config: Config,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        http: reqwest::Client,
    ) -> (Self, JoinHandle<()>) {
        let config = Arc::new(config);
        let fulfiller = Arc::new(Fulfiller::new(
            config.clone(),
            gateway.clone(),
            mailer.clone(),
            http,
        ));
        let (queue, rx) = EventQueue::bounded(config.webhook_queue_capacity);
        let worker = spawn_worker(fulfiller.clone(), rx);

        let state = Self {
            history: WebhookHistory::new(config.webhook_history_size),
            config,
            gateway,
            mailer,
            fulfiller,
            queue,
        };

        (state, worker)
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn index() -> &'static str {
    "Payment service is running"
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckoutQuery {
    #[serde(default)]
    pub email: Option<String>,
}

/// Redirect the buyer to a payment page.
///
/// A configured static payment link wins; otherwise a checkout is created
/// through the gateway API.
pub async fn checkout(
    State(state): State<AppState>,
    Query(query): Query<CheckoutQuery>,
) -> Result<Redirect, ApiError> {
    if let Some(link) = state.config.static_payment_link.as_deref() {
        let Some(url) = redirect_url(link) else {
            error!(link = ?link, "checkout_static_link_invalid");
            return Err(ApiError::Internal {
                message: "configured payment link is not a valid URL".to_string(),
                detail: None,
            });
        };
        info!("checkout_static_redirect");
        return Ok(Redirect::to(url.as_str()));
    }

    let email = query.email.as_deref().and_then(plausible_email);
    let checkout_url = create_checkout(&state, email, None).await?;

    Ok(Redirect::to(&checkout_url))
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PaymentLink {
    pub payment_url: String,
}

/// Create a checkout for a given buyer and return its URL.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<Json<PaymentLink>, ApiError> {
    let email = body
        .email
        .as_deref()
        .and_then(plausible_email)
        .ok_or_else(|| ApiError::BadRequest("email is required".to_string()))?;

    let payment_url = create_checkout(&state, Some(email), body.amount).await?;

    Ok(Json(PaymentLink { payment_url }))
}

async fn create_checkout(
    state: &AppState,
    email: Option<String>,
    amount: Option<u64>,
) -> Result<String, ApiError> {
    let config = &state.config;

    if config.gateway_secret_key.is_none() {
        warn!("checkout_gateway_not_configured");
        return Err(ApiError::Internal {
            message: "payment gateway is not configured".to_string(),
            detail: None,
        });
    }

    let mut metadata = Map::new();
    metadata.insert("product".to_string(), Value::String(config.course_name.clone()));
    if let Some(email) = email {
        metadata.insert("email".to_string(), Value::String(email));
    }

    let request = CheckoutRequest {
        amount: amount.unwrap_or(config.course_price),
        currency: config.course_currency.clone(),
        success_url: config.thank_you_url.clone(),
        failure_url: config.failure_url.clone(),
        description: config.course_name.clone(),
        locale: "en".to_string(),
        metadata,
    };

    let checkout = state.gateway.create_checkout(&request).await.map_err(|e| {
        error!(error = %e, "checkout_create_failed");
        ApiError::from(e)
    })?;

    // Ends up in a Location header
    let url = redirect_url(&checkout.checkout_url).ok_or_else(|| {
        error!(checkout_url = ?checkout.checkout_url, "checkout_url_invalid");
        ApiError::from(GatewayError::InvalidCheckoutUrl(checkout.checkout_url.clone()))
    })?;

    Ok(url.into())
}

// =============================================================================
// Payment Webhook
// =============================================================================

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub timestamp: String,
}

/// Payment gateway webhook endpoint.
///
/// Always answers 200 so the gateway does not retry; the event is processed
/// by the background worker.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    let event = InboundEvent::new(body, signature_from_headers(&headers));

    info!(
        event_id = %event.id,
        body_length = event.raw.len(),
        has_signature = event.signature.is_some(),
        "webhook_received"
    );

    state.history.record(WebhookSnapshot::capture(
        event.id,
        event.received_at,
        &event.raw,
        event.signature.is_some(),
    ));

    match state.queue.enqueue(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            error!(event_id = %event.id, "webhook_queue_full");
        }
        Err(TrySendError::Closed(event)) => {
            error!(event_id = %event.id, "webhook_queue_closed");
        }
    }

    Json(WebhookAck {
        received: true,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Most recently received webhook.
pub async fn last_webhook(
    State(state): State<AppState>,
) -> Result<Json<WebhookSnapshot>, ApiError> {
    state
        .history
        .latest()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no webhook received yet".to_string()))
}

/// Retained webhooks, newest first.
pub async fn recent_webhooks(State(state): State<AppState>) -> Json<Vec<WebhookSnapshot>> {
    Json(state.history.recent())
}

// =============================================================================
// Return Redirect
// =============================================================================

/// The gateway has used more than one name for each of these parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentReturnQuery {
    pub payment_id: Option<String>,
    pub id: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub email: Option<String>,
    pub customer_email: Option<String>,
}

impl From<PaymentReturnQuery> for PaymentReturn {
    fn from(q: PaymentReturnQuery) -> Self {
        PaymentReturn {
            payment_id: q.payment_id.or(q.id),
            status: q.status.or(q.payment_status),
            email: q.email.or(q.customer_email),
        }
    }
}

/// Best-effort fulfillment from the buyer's return, then the thank-you page.
pub async fn payment_return(
    State(state): State<AppState>,
    Query(query): Query<PaymentReturnQuery>,
) -> Redirect {
    let ret = PaymentReturn::from(query);
    let disposition = state.fulfiller.fulfill_return(&ret).await;

    info!(
        payment_id = ret.payment_id.as_deref().unwrap_or(""),
        disposition = disposition.as_str(),
        "payment_return_processed"
    );

    Redirect::to(&state.config.thank_you_url)
}

// =============================================================================
// Static Redirects
// =============================================================================

pub async fn thank_you(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.thank_you_url)
}

pub async fn failed(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.failure_url)
}

// =============================================================================
// Test Email
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TestEmailQuery {
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestEmailSent {
    pub sent: bool,
    pub to: String,
    pub id: String,
}

/// Send the fulfillment email to a chosen address for manual verification.
pub async fn test_email(
    State(state): State<AppState>,
    Query(query): Query<TestEmailQuery>,
) -> Result<Json<TestEmailSent>, ApiError> {
    // An explicit but malformed `to` must not fall back to the default
    let to = match query.to.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => plausible_email(raw).ok_or_else(|| {
            ApiError::BadRequest("to is not a valid email address".to_string())
        })?,
        None => state.config.test_email_to.clone().ok_or_else(|| {
            ApiError::BadRequest("provide ?to= or set TEST_EMAIL_TO".to_string())
        })?,
    };

    let record = FulfillmentRecord::new(to, state.config.course_link.clone());

    let id = state.mailer.send_fulfillment(&record).await.map_err(|e| {
        error!(to = %record.recipient_email, error = %e, "test_email_failed");
        ApiError::from(e)
    })?;

    info!(to = %record.recipient_email, message_id = %id, "test_email_sent");

    Ok(Json(TestEmailSent {
        sent: true,
        to: record.recipient_email,
        id,
    }))
}
