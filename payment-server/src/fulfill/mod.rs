//! Webhook fulfillment.
//!
//! Runs after the gateway has been acknowledged, so nothing here can change
//! the webhook response. Every branch ends in a [`Disposition`] and a log line.
//!
//! ## Processing Flow
//!
//! ```text
//! InboundEvent → verify signature → parse → ┬→ forward (optional)
//!                                           └→ classify → resolve email → send
//! ```

pub mod classify;
pub mod email;
pub mod forward;
pub mod worker;

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::SignaturePolicy;
use crate::gateway::PaymentGateway;
use crate::mail::{FulfillmentRecord, Mailer};
use crate::web::signature::verify_webhook_signature;
use crate::Config;

pub use classify::{classify, is_success_status, PaymentOutcome};
pub use email::{extract_customer_id, extract_email, plausible_email, resolve_email, EmailSource};
pub use forward::forward_event;
pub use worker::{spawn_worker, EventQueue, InboundEvent};

/// How a webhook or return redirect ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Fulfilled { recipient: String, message_id: String },
    SignatureRejected,
    ParseFailed,
    NotPaid,
    EmailUnresolved,
    SendFailed,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Fulfilled { .. } => "fulfilled",
            Disposition::SignatureRejected => "signature_rejected",
            Disposition::ParseFailed => "parse_failed",
            Disposition::NotPaid => "not_paid",
            Disposition::EmailUnresolved => "email_unresolved",
            Disposition::SendFailed => "send_failed",
        }
    }
}

/// Query parameters of the gateway's synchronous return redirect.
#[derive(Debug, Clone, Default)]
pub struct PaymentReturn {
    pub payment_id: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
}

/// Turns confirmed payments into fulfillment emails.
#[derive(Clone)]
pub struct Fulfiller {
    config: Arc<Config>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    http: Client,
}

impl Fulfiller {
    pub fn new(
        config: Arc<Config>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        http: Client,
    ) -> Self {
        Self {
            config,
            gateway,
            mailer,
            http,
        }
    }

    /// Process one acknowledged webhook end to end.
    pub async fn process_event(&self, event: InboundEvent) -> Disposition {
        let check = verify_webhook_signature(
            self.config.gateway_secret_key.as_deref(),
            &event.raw,
            event.signature.as_deref(),
        );

        if check.is_valid() {
            info!(event_id = %event.id, "webhook_signature_valid");
        } else {
            warn!(
                event_id = %event.id,
                reason = check.as_str(),
                policy = self.config.signature_policy.as_str(),
                "webhook_signature_unverified"
            );
            if self.config.signature_policy == SignaturePolicy::Strict {
                return Disposition::SignatureRejected;
            }
        }

        let parsed: Value = match serde_json::from_slice(&event.raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    event_id = %event.id,
                    error = %e,
                    body_length = event.raw.len(),
                    "webhook_parse_failed"
                );
                return Disposition::ParseFailed;
            }
        };

        let (disposition, _) = tokio::join!(self.fulfill_event(&parsed), self.forward(&event.raw));
        disposition
    }

    /// Classify a parsed event and fulfill it if paid.
    pub async fn fulfill_event(&self, event: &Value) -> Disposition {
        match classify(event) {
            PaymentOutcome::Paid => {}
            PaymentOutcome::NotPaid { event_type, status } => {
                info!(
                    event_type = event_type.as_deref().unwrap_or(""),
                    status = status.as_deref().unwrap_or(""),
                    "webhook_not_paid"
                );
                return Disposition::NotPaid;
            }
        }

        let Some((recipient, source)) = resolve_email(event, self.gateway.as_ref()).await else {
            let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");
            warn!(event_type = event_type, "webhook_email_unresolved");
            return Disposition::EmailUnresolved;
        };

        info!(to = %recipient, source = ?source, "webhook_email_resolved");

        self.send(recipient).await
    }

    /// Best-effort fulfillment from the return redirect.
    pub async fn fulfill_return(&self, ret: &PaymentReturn) -> Disposition {
        let paid = ret.status.as_deref().map(is_success_status).unwrap_or(false);
        if !paid {
            info!(
                payment_id = ret.payment_id.as_deref().unwrap_or(""),
                status = ret.status.as_deref().unwrap_or(""),
                "payment_return_not_paid"
            );
            return Disposition::NotPaid;
        }

        if let Some(email) = ret.email.as_deref().and_then(plausible_email) {
            return self.send(email).await;
        }

        let Some(payment_id) = ret.payment_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            warn!("payment_return_email_unresolved");
            return Disposition::EmailUnresolved;
        };

        let checkout = match self.gateway.fetch_checkout(payment_id.trim()).await {
            Ok(checkout) => checkout,
            Err(e) => {
                warn!(payment_id = %payment_id, error = %e, "payment_return_lookup_failed");
                return Disposition::EmailUnresolved;
            }
        };

        match resolve_email(&checkout, self.gateway.as_ref()).await {
            Some((email, _)) => self.send(email).await,
            None => {
                warn!(payment_id = %payment_id, "payment_return_email_unresolved");
                Disposition::EmailUnresolved
            }
        }
    }

    async fn send(&self, recipient: String) -> Disposition {
        let record = FulfillmentRecord::new(recipient, self.config.course_link.clone());

        match self.mailer.send_fulfillment(&record).await {
            Ok(message_id) => {
                info!(to = %record.recipient_email, message_id = %message_id, "fulfillment_sent");
                Disposition::Fulfilled {
                    recipient: record.recipient_email,
                    message_id,
                }
            }
            Err(e) => {
                error!(to = %record.recipient_email, error = %e, "fulfillment_send_failed");
                Disposition::SendFailed
            }
        }
    }

    async fn forward(&self, raw: &[u8]) {
        if let Some(url) = self.config.forward_webhook_url.as_deref() {
            forward_event(&self.http, url, raw, self.config.request_timeout()).await;
        }
    }
}
