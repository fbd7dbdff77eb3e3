//! Payment-success classification of gateway events.

use serde_json::Value;

/// Event types that mean the buyer has paid.
pub const SUCCESS_EVENT_TYPES: &[&str] = &[
    "checkout.paid",
    "checkout.completed",
    "payment.paid",
    "payment.succeeded",
];

/// Status values that mean the buyer has paid, compared case-insensitively.
pub const SUCCESS_STATUSES: &[&str] = &["paid", "succeeded", "success", "completed"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    NotPaid {
        event_type: Option<String>,
        status: Option<String>,
    },
}

impl PaymentOutcome {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentOutcome::Paid)
    }
}

pub fn is_success_status(status: &str) -> bool {
    let status = status.trim();
    SUCCESS_STATUSES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(status))
}

/// Classify an event as paid by its `type`, or by `data.status` falling back
/// to a top-level `status`.
pub fn classify(event: &Value) -> PaymentOutcome {
    let event_type = event.get("type").and_then(Value::as_str);
    let status = event
        .pointer("/data/status")
        .and_then(Value::as_str)
        .or_else(|| event.get("status").and_then(Value::as_str));

    let type_paid = event_type
        .map(|t| SUCCESS_EVENT_TYPES.contains(&t.trim()))
        .unwrap_or(false);
    let status_paid = status.map(is_success_status).unwrap_or(false);

    if type_paid || status_paid {
        PaymentOutcome::Paid
    } else {
        PaymentOutcome::NotPaid {
            event_type: event_type.map(str::to_string),
            status: status.map(str::to_string),
        }
    }
}
