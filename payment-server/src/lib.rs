//! Coursepay - checkout redirects and payment fulfillment for a digital course.
//!
//! The service sends buyers to the payment gateway, receives the gateway's
//! payment webhooks and emails the course link once a payment is confirmed.
//!
//! ## Architecture
//!
//! ```text
//! Buyer → /checkout → Gateway checkout page
//! Gateway → /webhook → queue → Fulfillment worker → Email provider
//!                                                 ↘ Forward URL (optional)
//! ```

pub mod config;
pub mod error;
pub mod fulfill;
pub mod gateway;
pub mod history;
pub mod mail;
pub mod web;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{Config, SignaturePolicy};
pub use error::{GatewayError, MailError};
pub use fulfill::{Disposition, Fulfiller, InboundEvent};
pub use gateway::{ChargilyClient, PaymentGateway};
pub use history::{WebhookHistory, WebhookSnapshot};
pub use mail::{FulfillmentRecord, Mailer, ResendMailer};
pub use web::{router, AppState};
