//! Payment gateway webhook signature verification.
//!
//! The gateway signs each webhook with HMAC-SHA256 over the exact request
//! body, keyed with the account's secret key, and sends the hex digest in the
//! `signature` header. Verification must run over the raw bytes, never over
//! re-serialized JSON.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header names the gateway may use, in lookup order.
pub const SIGNATURE_HEADERS: [&str; 2] = ["signature", "x-signature"];

/// Result of checking a webhook signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    /// Signature present but does not match the body
    Invalid,
    /// No signature header on the request
    Missing,
    /// No secret configured to verify against
    NoSecret,
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureCheck::Valid => "valid",
            SignatureCheck::Invalid => "invalid",
            SignatureCheck::Missing => "missing",
            SignatureCheck::NoSecret => "no_secret",
        }
    }
}

/// Extract the signature header value, trying each known header name.
pub fn signature_from_headers(headers: &HeaderMap) -> Option<String> {
    SIGNATURE_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Compute the hex HMAC-SHA256 digest of `body` keyed with `secret`.
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature against the raw request body.
pub fn verify_webhook_signature(
    secret: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
) -> SignatureCheck {
    let secret = match secret.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s,
        None => return SignatureCheck::NoSecret,
    };

    let signature = match signature.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s,
        None => return SignatureCheck::Missing,
    };

    let expected = match sign_body(secret, body) {
        Some(sig) => sig,
        None => {
            warn!("webhook_signature_invalid_key");
            return SignatureCheck::Invalid;
        }
    };

    // Hex digests are case-insensitive
    let provided = signature.to_ascii_lowercase();

    if constant_time_compare(&expected, &provided) {
        SignatureCheck::Valid
    } else {
        warn!(
            expected_length = expected.len(),
            actual_length = provided.len(),
            "webhook_signature_mismatch"
        );
        SignatureCheck::Invalid
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
