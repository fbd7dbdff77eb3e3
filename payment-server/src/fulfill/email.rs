//! Recipient email resolution.
//!
//! Gateway events put the buyer's email in different places depending on how
//! the checkout was created. The field paths below are tried in order and the
//! first plausible address wins. When none matches, the customer id is looked
//! up through the gateway.

use serde_json::Value;
use tracing::{info, warn};

use crate::gateway::PaymentGateway;

/// JSON pointers tried in order when looking for the buyer's email.
pub const EMAIL_FIELD_PATHS: &[&str] = &[
    "/data/customer/email",
    "/data/customer_email",
    "/data/metadata/email",
    "/data/metadata/customer_email",
    "/data/client/email",
    "/customer/email",
    "/customer_email",
    "/client/email",
    "/metadata/email",
    "/email",
];

/// JSON pointers tried in order when looking for a customer id.
pub const CUSTOMER_ID_PATHS: &[&str] = &[
    "/data/customer_id",
    "/data/customer",
    "/customer_id",
    "/customer",
];

/// Where a resolved email came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailSource {
    Field(&'static str),
    CustomerLookup(String),
}

/// Return the trimmed address if it looks like an email.
pub fn plausible_email(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if !candidate.is_empty() && candidate.contains('@') {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// First plausible email found along [`EMAIL_FIELD_PATHS`].
pub fn extract_email(event: &Value) -> Option<(String, &'static str)> {
    EMAIL_FIELD_PATHS.iter().find_map(|path| {
        event
            .pointer(path)
            .and_then(Value::as_str)
            .and_then(plausible_email)
            .map(|email| (email, *path))
    })
}

/// First non-empty customer id found along [`CUSTOMER_ID_PATHS`].
///
/// `customer` only counts when it is a plain id string, not an object.
pub fn extract_customer_id(event: &Value) -> Option<String> {
    CUSTOMER_ID_PATHS.iter().find_map(|path| {
        event
            .pointer(path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

/// Resolve the recipient from the event, falling back to a customer lookup.
pub async fn resolve_email(
    event: &Value,
    gateway: &dyn PaymentGateway,
) -> Option<(String, EmailSource)> {
    if let Some((email, path)) = extract_email(event) {
        return Some((email, EmailSource::Field(path)));
    }

    let customer_id = extract_customer_id(event)?;

    let customer = match gateway.fetch_customer(&customer_id).await {
        Ok(customer) => customer,
        Err(e) => {
            warn!(customer_id = %customer_id, error = %e, "customer_lookup_failed");
            return None;
        }
    };

    let email = customer
        .pointer("/email")
        .or_else(|| customer.pointer("/data/email"))
        .and_then(Value::as_str)
        .and_then(plausible_email);

    match email {
        Some(email) => {
            info!(customer_id = %customer_id, "customer_lookup_resolved_email");
            Some((email, EmailSource::CustomerLookup(customer_id)))
        }
        None => {
            warn!(customer_id = %customer_id, "customer_lookup_no_email");
            None
        }
    }
}
