//! HTTP email API client (Resend-compatible `POST /emails`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{render_html, render_text, FulfillmentRecord, Mailer};
use crate::error::{preview, MailError};
use crate::Config;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Sends fulfillment emails through the provider's REST API.
#[derive(Clone)]
pub struct ResendMailer {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    subject: String,
    course_name: String,
    timeout: Duration,
}

impl ResendMailer {
    pub fn from_config(http: Client, config: &Config) -> Self {
        Self {
            http,
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
            subject: config.email_subject.clone(),
            course_name: config.course_name.clone(),
            timeout: config.request_timeout(),
        }
    }

    fn build_request<'a>(&'a self, record: &'a FulfillmentRecord) -> SendEmailRequest<'a> {
        SendEmailRequest {
            from: &self.from,
            to: [record.recipient_email.as_str()],
            subject: &self.subject,
            html: render_html(&self.course_name, &record.resource_link),
            text: render_text(&self.course_name, &record.resource_link),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_fulfillment(&self, record: &FulfillmentRecord) -> Result<String, MailError> {
        let key = self.api_key.as_deref().ok_or(MailError::NotConfigured)?;

        let response = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(key)
            .timeout(self.timeout)
            .json(&self.build_request(record))
            .send()
            .await
            .inspect_err(|e| {
                error!(
                    to = %record.recipient_email,
                    error = %e,
                    timeout = e.is_timeout(),
                    "email_send_request_error"
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                to = %record.recipient_email,
                status_code = status.as_u16(),
                body = %preview(&body),
                "email_send_rejected"
            );
            return Err(MailError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let parsed: SendEmailResponse = response.json().await?;
        let id = parsed.id.unwrap_or_default();

        info!(to = %record.recipient_email, message_id = %id, "email_sent");

        Ok(id)
    }
}
