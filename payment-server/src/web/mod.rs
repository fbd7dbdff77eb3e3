//! Web server module.
//!
//! Routes buyers to the payment page, receives gateway webhooks and exposes a
//! few operator endpoints for checking the setup by hand.

pub mod error;
pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use handlers::{AppState, HealthResponse, PaymentLink, WebhookAck};
pub use signature::{verify_webhook_signature, SignatureCheck};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/checkout", get(handlers::checkout))
        .route("/create-payment", post(handlers::create_payment))
        .route("/payment-return", get(handlers::payment_return))
        .route("/webhook", post(handlers::payment_webhook))
        .route("/last-webhook", get(handlers::last_webhook))
        .route("/webhooks/recent", get(handlers::recent_webhooks))
        .route("/simulate-success", get(handlers::thank_you))
        .route("/simulate-failed", get(handlers::failed))
        .route("/thank-you", get(handlers::thank_you))
        .route("/failed", get(handlers::failed))
        .route("/test-email", get(handlers::test_email))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
