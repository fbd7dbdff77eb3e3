//! Downstream forwarding of gateway events.

use std::time::Duration;

use reqwest::Client;
use tracing::{error, info, warn};

/// POST the original event body to `url`.
///
/// Returns whether the downstream accepted it. Failures are logged and never
/// propagated; there is no retry.
pub async fn forward_event(client: &Client, url: &str, body: &[u8], timeout: Duration) -> bool {
    let result = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .timeout(timeout)
        .body(body.to_vec())
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            info!(
                url = url,
                status_code = resp.status().as_u16(),
                body_length = body.len(),
                "webhook_forwarded"
            );
            true
        }
        Ok(resp) => {
            warn!(url = url, status_code = resp.status().as_u16(), "webhook_forward_rejected");
            false
        }
        Err(e) => {
            if e.is_timeout() {
                error!(
                    url = url,
                    timeout_seconds = timeout.as_secs_f64(),
                    error = %e,
                    "webhook_forward_timeout"
                );
            } else {
                error!(url = url, error = %e, "webhook_forward_error");
            }
            false
        }
    }
}
