//! Error types for the outbound gateway and email clients.

use thiserror::Error;

/// Payment gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No secret key configured
    #[error("payment gateway is not configured")]
    NotConfigured,

    /// Transport failure or timeout
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with a non-2xx status
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Configured base URL cannot be joined with a path
    #[error("invalid gateway url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// 2xx response without the field we needed
    #[error("gateway response missing {0}")]
    MissingField(&'static str),

    /// Checkout URL that cannot be used as a redirect target
    #[error("gateway returned an unusable checkout url: {0:?}")]
    InvalidCheckoutUrl(String),
}

/// Email provider errors.
#[derive(Error, Debug)]
pub enum MailError {
    #[error("email provider is not configured")]
    NotConfigured,

    #[error("email request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email provider returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Truncate an upstream error body so log lines and responses stay bounded.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(500).collect()
}
