//! Configuration module for environment variable parsing.
//!
//! Every setting is optional. Missing gateway or email credentials do not stop
//! the server from starting; the affected routes report the gap at request time.

use std::env;
use std::time::Duration;

use tracing::warn;

const DEFAULT_API_URL: &str = "https://pay.chargily.net/api/v2";
const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com";
const DEFAULT_THANK_YOU_URL: &str = "https://www.kobouchacademy.com/943d7675";
const DEFAULT_FAILURE_URL: &str = "https://www.kobouchacademy.com/93e8de5d";

/// What to do with a webhook whose signature does not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Log a warning and keep processing the event.
    Permissive,
    /// Log a warning and drop the event. The gateway has already been acknowledged.
    Strict,
}

impl SignaturePolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "permissive" => Some(Self::Permissive),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Strict => "strict",
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    // =========================================================================
    // Payment Gateway
    // =========================================================================

    /// Gateway API key, also the HMAC secret for webhook signatures
    pub gateway_secret_key: Option<String>,

    /// Gateway REST base URL (no trailing slash)
    pub gateway_api_url: String,

    /// Pre-created payment page; takes precedence over dynamic checkouts
    pub static_payment_link: Option<String>,

    /// Downstream URL that receives a copy of every webhook event
    pub forward_webhook_url: Option<String>,

    /// Handling of webhooks that fail signature verification
    pub signature_policy: SignaturePolicy,

    // =========================================================================
    // Product
    // =========================================================================

    pub course_name: String,

    /// Link emailed to the buyer after payment
    pub course_link: String,

    /// Price in the unit the gateway expects
    pub course_price: u64,

    pub course_currency: String,

    pub thank_you_url: String,

    pub failure_url: String,

    // =========================================================================
    // Email Provider
    // =========================================================================

    pub email_api_key: Option<String>,

    pub email_api_url: String,

    pub email_from: String,

    pub email_subject: String,

    /// Default recipient for `/test-email`
    pub test_email_to: Option<String>,

    // =========================================================================
    // Runtime
    // =========================================================================

    /// Timeout applied to each outbound HTTP call
    pub request_timeout_ms: u64,

    /// Number of recent webhooks kept for inspection
    pub webhook_history_size: usize,

    /// Capacity of the background fulfillment queue
    pub webhook_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 3000),

            gateway_secret_key: non_empty("CHARGILY_SECRET_KEY"),

            gateway_api_url: non_empty("CHARGILY_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),

            static_payment_link: non_empty("CHARGILY_PAYMENT_LINK"),

            forward_webhook_url: non_empty("FORWARD_WEBHOOK_URL"),

            signature_policy: match env::var("WEBHOOK_SIGNATURE_POLICY") {
                Ok(raw) => SignaturePolicy::parse(&raw).unwrap_or_else(|| {
                    warn!(env_var = "WEBHOOK_SIGNATURE_POLICY", value = %raw, "Invalid policy, using permissive");
                    SignaturePolicy::Permissive
                }),
                Err(_) => SignaturePolicy::Permissive,
            },

            course_name: non_empty("COURSE_NAME").unwrap_or_else(|| "Digital Course".to_string()),

            course_link: non_empty("COURSE_LINK")
                .unwrap_or_else(|| "https://www.kobouchacademy.com/course-access".to_string()),

            course_price: parse_or("COURSE_PRICE", 4900),

            course_currency: non_empty("COURSE_CURRENCY").unwrap_or_else(|| "dzd".to_string()),

            thank_you_url: non_empty("THANK_YOU_URL")
                .unwrap_or_else(|| DEFAULT_THANK_YOU_URL.to_string()),

            failure_url: non_empty("FAILURE_URL").unwrap_or_else(|| DEFAULT_FAILURE_URL.to_string()),

            email_api_key: non_empty("EMAIL_API_KEY").or_else(|| non_empty("RESEND_API_KEY")),

            email_api_url: non_empty("EMAIL_API_URL")
                .unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),

            email_from: non_empty("EMAIL_FROM").unwrap_or_else(|| "onboarding@resend.dev".to_string()),

            email_subject: non_empty("EMAIL_SUBJECT")
                .unwrap_or_else(|| "Your course access".to_string()),

            test_email_to: non_empty("TEST_EMAIL_TO"),

            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 8000),

            webhook_history_size: parse_or("WEBHOOK_HISTORY_SIZE", 20),

            webhook_queue_capacity: parse_or::<usize>("WEBHOOK_QUEUE_CAPACITY", 256).max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for Config {
    /// Defaults with nothing configured; equivalent to an empty environment.
    fn default() -> Self {
        Config {
            port: 3000,
            gateway_secret_key: None,
            gateway_api_url: DEFAULT_API_URL.to_string(),
            static_payment_link: None,
            forward_webhook_url: None,
            signature_policy: SignaturePolicy::Permissive,
            course_name: "Digital Course".to_string(),
            course_link: "https://www.kobouchacademy.com/course-access".to_string(),
            course_price: 4900,
            course_currency: "dzd".to_string(),
            thank_you_url: DEFAULT_THANK_YOU_URL.to_string(),
            failure_url: DEFAULT_FAILURE_URL.to_string(),
            email_api_key: None,
            email_api_url: DEFAULT_EMAIL_API_URL.to_string(),
            email_from: "onboarding@resend.dev".to_string(),
            email_subject: "Your course access".to_string(),
            test_email_to: None,
            request_timeout_ms: 8000,
            webhook_history_size: 20,
            webhook_queue_capacity: 256,
        }
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
